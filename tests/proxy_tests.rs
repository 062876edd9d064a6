//! End-to-end tests through the full router: session gate, OAuth endpoints
//! and the bucket proxy, backed by an in-memory object store and a local
//! stand-in for the Google endpoints.

use async_trait::async_trait;
use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, Response, StatusCode, header},
    response::IntoResponse,
    routing,
};
use chrono::{DateTime, TimeZone, Utc};
use gcs_proxy::{
    config::{AppConfig, Args},
    models::object::ObjectMetadata,
    routes::routes::routes,
    services::{
        object_store::{ObjectStore, StoreError, StoreResult, StoredObject},
        session_service::{DEFAULT_SESSION_MAX_AGE_SECS, SESSION_COOKIE_NAME, SessionGate},
    },
    state::AppState,
};
use serde_json::json;
use std::{
    collections::HashMap,
    io::{self, Cursor},
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{
    io::{AsyncRead, ReadBuf},
    net::TcpListener,
};
use tower::ServiceExt;

const SECRET: &str = "test-session-secret";
const ALLOWED_DOMAIN: &str = "lenses.io";
const HOST: &str = "example.com";
const BROKEN_BUCKET: &str = "broken-bucket";
const FLAKY_BUCKET: &str = "flaky-bucket";
const FLAKY_OBJECT_SIZE: u64 = 1024;

/// Yields one chunk, then fails as if the bucket connection dropped.
struct FlakyReader {
    sent: bool,
}

impl AsyncRead for FlakyReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.sent {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "bucket connection reset",
            )));
        }
        self.sent = true;
        buf.put_slice(b"partial");
        Poll::Ready(Ok(()))
    }
}

#[derive(Default)]
struct MemoryStore {
    objects: HashMap<(String, String), (String, Vec<u8>, DateTime<Utc>)>,
}

impl MemoryStore {
    fn with(mut self, bucket: &str, key: &str, content_type: &str, body: &[u8]) -> Self {
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            (
                content_type.to_string(),
                body.to_vec(),
                Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 0).unwrap(),
            ),
        );
        self
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        if bucket == BROKEN_BUCKET {
            return Err(StoreError::Backend("backend unavailable".into()));
        }
        if bucket == FLAKY_BUCKET {
            return Ok(StoredObject {
                metadata: ObjectMetadata {
                    key: key.to_string(),
                    content_type: "application/octet-stream".into(),
                    size: FLAKY_OBJECT_SIZE,
                    updated_at: Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 0).unwrap(),
                },
                reader: Box::pin(FlakyReader { sent: false }),
            });
        }
        let (content_type, body, updated_at) = self
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(StoredObject {
            metadata: ObjectMetadata {
                key: key.to_string(),
                content_type: content_type.clone(),
                size: body.len() as u64,
                updated_at: *updated_at,
            },
            reader: Box::pin(Cursor::new(body.clone())),
        })
    }
}

fn config(buckets: &[(&str, &str)], provider: Option<SocketAddr>) -> AppConfig {
    let mut text = String::from(
        r#"
        [web]
        port = 8080
        instance_name = "test-proxy"

        [web.oauth]
        client_id = "client-id"
        client_secret = "client-secret"
        session_secret = "test-session-secret"
        allowed_hosted_domains = ["lenses.io"]
        "#,
    );
    if let Some(addr) = provider {
        text.push_str(&format!(
            "token_url = \"http://{addr}/token\"\nuserinfo_url = \"http://{addr}/userinfo\"\n"
        ));
    }
    text.push_str("\n[store.buckets]\n");
    for (alias, bucket) in buckets {
        text.push_str(&format!("{alias} = \"{bucket}\"\n"));
    }
    let cfg = AppConfig::merge(
        AppConfig::parse_file(&text).unwrap(),
        &Args::default(),
        None,
        None,
    );
    cfg.validate().unwrap();
    cfg
}

fn app_with(store: MemoryStore, buckets: &[(&str, &str)], provider: Option<SocketAddr>) -> Router {
    routes(AppState::new(&config(buckets, provider), Arc::new(store)))
}

fn default_store() -> MemoryStore {
    MemoryStore::default()
        .with("bucket1", "existing/key", "text/plain", b"hello from bucket1")
}

fn session_cookie(secret: &str, domain: &str) -> String {
    let gate = SessionGate::new(secret, [ALLOWED_DOMAIN.to_string()], DEFAULT_SESSION_MAX_AGE_SECS);
    let cookie = gate.issue_cookie(domain, false).unwrap();
    format!("{}={}", cookie.name(), cookie.value())
}

fn get(uri: &str, cookies: &[&str]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header(header::HOST, HOST);
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies.join("; "));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// `Set-Cookie` headers keyed by cookie name.
fn set_cookies(response: &Response<Body>) -> HashMap<String, String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .map(|raw| {
            let name = raw.split('=').next().unwrap().to_string();
            (name, raw)
        })
        .collect()
}

fn cookie_value(raw: &str) -> &str {
    raw.split(';').next().unwrap().split_once('=').unwrap().1
}

// --- Session gate -----------------------------------------------------------

#[tokio::test]
async fn test_should_redirect_to_login_without_session_cookie() {
    let app = app_with(default_store(), &[("b1", "bucket1")], None);
    let response = send(app, get("/path/to/resource?q=some%20param", &[])).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://example.com/auth/google/login");

    let cookies = set_cookies(&response);
    let target = &cookies["loginTargetPath"];
    assert!(target.contains("Path=/"));
    assert_eq!(
        urlencoding::decode(cookie_value(target)).unwrap(),
        "/path/to/resource?q=some%20param"
    );
    assert!(!cookies.contains_key(SESSION_COOKIE_NAME));
}

#[tokio::test]
async fn test_should_redirect_to_login_when_cookie_is_tampered() {
    let app = app_with(default_store(), &[("b1", "bucket1")], None);
    let forged = session_cookie("wrong-secret", ALLOWED_DOMAIN);
    let response = send(app, get("/b1/existing/key", &[&forged])).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://example.com/auth/google/login");
    assert!(set_cookies(&response).contains_key("loginTargetPath"));
}

#[tokio::test]
async fn test_should_forbid_domain_outside_allow_list() {
    let app = app_with(default_store(), &[("b1", "bucket1")], None);
    let cookie = session_cookie(SECRET, "acme.com");
    let response = send(app, get("/b1/existing/key", &[&cookie])).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_should_pass_valid_session_to_proxy() {
    let app = app_with(default_store(), &[], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    let response = send(app, get("/path/to/resource", &[&cookie])).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_should_honour_forwarded_proto_in_login_redirect() {
    let app = app_with(default_store(), &[], None);
    let request = Request::builder()
        .uri("/b1/x")
        .header(header::HOST, HOST)
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(location(&response), "https://example.com/auth/google/login");
    assert!(set_cookies(&response)["loginTargetPath"].contains("; Secure"));
}

#[tokio::test]
async fn test_should_serve_healthz_without_session() {
    let app = app_with(default_store(), &[], None);
    let response = send(app, get("/healthz", &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
}

// --- Alias router -----------------------------------------------------------

#[tokio::test]
async fn test_should_stream_existing_object() {
    let app = app_with(default_store(), &[("b1", "bucket1")], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    let response = send(app, get("/b1/existing/key", &[&cookie])).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers: &HeaderMap = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        headers[header::CONTENT_LENGTH],
        "hello from bucket1".len().to_string().as_str()
    );
    assert_eq!(headers[header::LAST_MODIFIED], "Fri, 17 May 2024 12:30:00 GMT");
    assert_eq!(body_text(response).await, "hello from bucket1");
}

#[tokio::test]
async fn test_should_return_404_for_missing_object() {
    let app = app_with(default_store(), &[("b1", "bucket1")], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    let response = send(app, get("/b1/missing/key", &[&cookie])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_should_return_500_for_store_failure() {
    let app = app_with(default_store(), &[("b1", "bucket1"), ("bad", BROKEN_BUCKET)], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    let response = send(app, get("/bad/any/key", &[&cookie])).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body_text(response).await.contains("backend unavailable"));
}

#[tokio::test]
async fn test_should_abort_body_when_read_fails_mid_stream() {
    let app = app_with(default_store(), &[("f", FLAKY_BUCKET)], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    let response = send(app, get("/f/big/file.bin", &[&cookie])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        FLAKY_OBJECT_SIZE.to_string().as_str()
    );
    assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
}

#[tokio::test]
async fn test_should_only_serve_objects_for_get() {
    let app = app_with(default_store(), &[("b1", "bucket1")], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    for method in ["POST", "PUT", "DELETE"] {
        let request = Request::builder()
            .method(method)
            .uri("/b1/existing/key")
            .header(header::HOST, HOST)
            .header(header::COOKIE, cookie.as_str())
            .body(Body::empty())
            .unwrap();
        let response = send(app.clone(), request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
    }
}

#[tokio::test]
async fn test_should_serve_informational_page_when_no_alias_matches() {
    let app = app_with(default_store(), &[], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    let response = send(app, get("/b1/existing/key", &[&cookie])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(body_text(response).await.contains("test-proxy"));
}

#[tokio::test]
async fn test_should_prefer_longest_alias() {
    let store = default_store().with("bucket1-archive", "existing/key", "text/plain", b"archived");
    let app = app_with(store, &[("b1", "bucket1"), ("b1-old", "bucket1-archive")], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    let response = send(app, get("/b1-old/existing/key", &[&cookie])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "archived");
}

#[tokio::test]
async fn test_should_decode_percent_encoded_keys() {
    let store = default_store().with("bucket1", "my report.txt", "text/plain", b"q1");
    let app = app_with(store, &[("b1", "bucket1")], None);
    let cookie = session_cookie(SECRET, ALLOWED_DOMAIN);
    let response = send(app, get("/b1/my%20report.txt", &[&cookie])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "q1");
}

// --- OAuth flow -------------------------------------------------------------

const GOOD_CODE: &str = "good-code";
const ACCESS_TOKEN: &str = "access-token-123";
/// Exchanges fine but mints a token the user-info endpoint rejects.
const REVOKED_CODE: &str = "revoked-code";
const REVOKED_TOKEN: &str = "revoked-token";

/// Local stand-in for Google's token and user-info endpoints.
async fn spawn_provider(hosted_domain: &'static str) -> SocketAddr {
    let provider = Router::new()
        .route(
            "/token",
            routing::post(|Form(form): Form<HashMap<String, String>>| async move {
                let authenticated = form.get("grant_type").map(String::as_str)
                    == Some("authorization_code")
                    && form.get("client_secret").map(String::as_str) == Some("client-secret");
                let token = match form.get("code").map(String::as_str) {
                    Some(GOOD_CODE) if authenticated => ACCESS_TOKEN,
                    Some(REVOKED_CODE) if authenticated => REVOKED_TOKEN,
                    _ => return (StatusCode::BAD_REQUEST, "invalid_grant").into_response(),
                };
                Json(json!({ "access_token": token, "token_type": "Bearer" })).into_response()
            }),
        )
        .route(
            "/userinfo",
            routing::get(move |headers: HeaderMap| async move {
                let expected = format!("Bearer {ACCESS_TOKEN}");
                match headers.get(header::AUTHORIZATION) {
                    Some(value) if value == expected.as_str() => Json(json!({
                        "hd": hosted_domain,
                        "email": format!("someone@{hosted_domain}"),
                    }))
                    .into_response(),
                    _ => StatusCode::UNAUTHORIZED.into_response(),
                }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, provider).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_should_start_login_with_state_cookie() {
    let app = app_with(default_store(), &[], None);
    let response = send(app, get("/auth/google/login", &[])).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let auth_url = url::Url::parse(location(&response)).unwrap();
    assert_eq!(auth_url.host_str(), Some("accounts.google.com"));
    let params: HashMap<_, _> = auth_url.query_pairs().into_owned().collect();
    assert_eq!(params["redirect_uri"], "http://example.com/auth/google/callback");

    let cookies = set_cookies(&response);
    let state_cookie = &cookies["oauthstate"];
    assert_eq!(cookie_value(state_cookie), params["state"]);
    assert!(state_cookie.contains("Expires="));
}

#[tokio::test]
async fn test_should_reject_callback_with_mismatched_state() {
    let app = app_with(default_store(), &[], None);
    let response = send(
        app,
        get(
            "/auth/google/callback?code=good-code&state=attacker",
            &["oauthstate=expected", "loginTargetPath=%2Fb1%2Fexisting%2Fkey"],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
    let cookies = set_cookies(&response);
    assert!(!cookies.contains_key(SESSION_COOKIE_NAME));
    assert!(!cookies.contains_key("loginTargetPath"));
}

#[tokio::test]
async fn test_should_reject_callback_without_state_cookie() {
    let app = app_with(default_store(), &[], None);
    let response = send(app, get("/auth/google/callback?code=good-code&state=", &[])).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
    assert!(!set_cookies(&response).contains_key(SESSION_COOKIE_NAME));
}

#[tokio::test]
async fn test_should_complete_login_and_restore_target() {
    let provider = spawn_provider(ALLOWED_DOMAIN).await;
    let app = app_with(default_store(), &[("b1", "bucket1")], Some(provider));

    let response = send(
        app.clone(),
        get(
            "/auth/google/callback?code=good-code&state=s3cr3t",
            &["oauthstate=s3cr3t", "loginTargetPath=%2Fb1%2Fexisting%2Fkey%3Fv%3D1"],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/b1/existing/key?v=1");

    let cookies = set_cookies(&response);
    let target = &cookies["loginTargetPath"];
    assert_eq!(cookie_value(target), "");
    assert!(target.contains("Max-Age=0"));
    assert!(target.contains("Path=/"));
    assert_eq!(
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter(|v| v.to_str().unwrap().starts_with("loginTargetPath="))
            .count(),
        1
    );

    // The minted session opens the gate.
    let session = cookies[SESSION_COOKIE_NAME].split(';').next().unwrap().to_string();
    let response = send(app, get("/b1/existing/key?v=1", &[&session])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "hello from bucket1");
}

#[tokio::test]
async fn test_should_redirect_to_root_without_login_target() {
    let provider = spawn_provider(ALLOWED_DOMAIN).await;
    let app = app_with(default_store(), &[], Some(provider));
    let response = send(
        app,
        get("/auth/google/callback?code=good-code&state=abc", &["oauthstate=abc"]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
    let cookies = set_cookies(&response);
    assert!(cookies.contains_key(SESSION_COOKIE_NAME));
    assert!(!cookies.contains_key("loginTargetPath"));
}

#[tokio::test]
async fn test_should_mint_session_that_is_forbidden_for_foreign_domain() {
    let provider = spawn_provider("acme.com").await;
    let app = app_with(default_store(), &[("b1", "bucket1")], Some(provider));
    let response = send(
        app.clone(),
        get("/auth/google/callback?code=good-code&state=abc", &["oauthstate=abc"]),
    )
    .await;
    let session = set_cookies(&response)[SESSION_COOKIE_NAME]
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = send(app, get("/b1/existing/key", &[&session])).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_should_fail_with_500_when_code_exchange_fails() {
    let provider = spawn_provider(ALLOWED_DOMAIN).await;
    let app = app_with(default_store(), &[], Some(provider));
    let response = send(
        app,
        get("/auth/google/callback?code=bad-code&state=abc", &["oauthstate=abc"]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!set_cookies(&response).contains_key(SESSION_COOKIE_NAME));
}

#[tokio::test]
async fn test_should_fail_with_500_when_user_info_is_rejected() {
    let provider = spawn_provider(ALLOWED_DOMAIN).await;
    let app = app_with(default_store(), &[], Some(provider));
    let response = send(
        app,
        get(
            "/auth/google/callback?code=revoked-code&state=abc",
            &["oauthstate=abc", "loginTargetPath=%2Fb1%2Fexisting%2Fkey"],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!set_cookies(&response).contains_key(SESSION_COOKIE_NAME));
}

#[tokio::test]
async fn test_should_refuse_accounts_without_hosted_domain() {
    let provider = spawn_provider("").await;
    let app = app_with(default_store(), &[("b1", "bucket1")], Some(provider));
    let response = send(
        app.clone(),
        get("/auth/google/callback?code=good-code&state=abc", &["oauthstate=abc"]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let session = set_cookies(&response)[SESSION_COOKIE_NAME]
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = send(app, get("/b1/existing/key", &[&session])).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
