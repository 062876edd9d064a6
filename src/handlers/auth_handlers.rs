//! Google OAuth2 login and callback endpoints.
//!
//! - `GET /auth/google/login`    -> sets the `oauthstate` cookie, 307 to Google
//! - `GET /auth/google/callback` -> checks state, exchanges the code, mints the
//!   session cookie and returns the browser to the page it first asked for

use crate::{
    cookies::{SetCookie, get_cookie},
    errors::AppError,
    handlers::redirect_with_cookies,
    services::oauth_service::generate_state_token,
    state::AppState,
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, Uri},
    response::Response,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

/// Canonical path for the Google OAuth2 login handler.
pub const GOOGLE_OAUTH_LOGIN_PATH: &str = "/auth/google/login";

/// Canonical path for the Google OAuth2 callback.
pub const GOOGLE_OAUTH_CALLBACK_PATH: &str = "/auth/google/callback";

pub const OAUTH_STATE_COOKIE_NAME: &str = "oauthstate";
pub const LOGIN_TARGET_COOKIE_NAME: &str = "loginTargetPath";

const OAUTH_STATE_COOKIE_PATH: &str = "/auth/google";
const OAUTH_STATE_LIFETIME_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

/// Encode a request URI so it survives as a cookie value.
pub(crate) fn encode_login_target(target: &str) -> String {
    urlencoding::encode(target).into_owned()
}

/// Decode a stashed login target, falling back to `/` for anything that is
/// not a path on this host.
pub(crate) fn decode_login_target(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(target)
            if target.starts_with('/')
                && !target.starts_with("//")
                && !target.starts_with("/\\") =>
        {
            target.into_owned()
        }
        _ => {
            warn!(login_target = raw, "ignoring login target that is not a local path");
            "/".to_string()
        }
    }
}

/// Compare the `state` query parameter against the `oauthstate` cookie
/// without leaking timing.
fn state_matches(expected: Option<&str>, provided: &str) -> bool {
    match expected {
        Some(expected) if !expected.is_empty() => {
            expected.as_bytes().ct_eq(provided.as_bytes()).into()
        }
        _ => false,
    }
}

/// `GET /auth/google/login`
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let origin = state.origin(&headers, &uri);
    let oauth_state = generate_state_token();
    let state_cookie = SetCookie::new(OAUTH_STATE_COOKIE_NAME, oauth_state.as_str())
        .path(OAUTH_STATE_COOKIE_PATH)
        .expires(Utc::now() + Duration::days(OAUTH_STATE_LIFETIME_DAYS))
        .http_only()
        .secure(origin.is_secure())
        .same_site_lax();

    let redirect_url = origin.resolve(GOOGLE_OAUTH_CALLBACK_PATH);
    let auth_url = state.oauth.authorization_url(&redirect_url, &oauth_state)?;
    debug!(redirect_url = %redirect_url, "starting google login");

    redirect_with_cookies(auth_url.as_str(), &[state_cookie])
}

/// `GET /auth/google/callback?code&state`
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let origin = state.origin(&headers, &uri);
    let clear_state = SetCookie::removal(OAUTH_STATE_COOKIE_NAME, OAUTH_STATE_COOKIE_PATH);

    if !state_matches(get_cookie(&headers, OAUTH_STATE_COOKIE_NAME), &query.state) {
        warn!("invalid oauth google state");
        return redirect_with_cookies("/", &[clear_state]);
    }

    let redirect_url = origin.resolve(GOOGLE_OAUTH_CALLBACK_PATH);
    let access_token = state.oauth.exchange_code(&query.code, &redirect_url).await?;
    let user = state.oauth.fetch_user_info(&access_token).await?;
    info!(
        hosted_domain = %user.hosted_domain,
        email = user.email.as_deref().unwrap_or(""),
        "google login completed"
    );
    if user.hosted_domain.is_empty() {
        warn!("google account has no hosted domain; the session will be refused");
    }

    let session_cookie = state
        .sessions
        .issue_cookie(&user.hosted_domain, origin.is_secure())?;
    let mut cookies = vec![clear_state, session_cookie];

    let target = match get_cookie(&headers, LOGIN_TARGET_COOKIE_NAME) {
        Some(raw) => {
            cookies.push(SetCookie::removal(LOGIN_TARGET_COOKIE_NAME, "/"));
            decode_login_target(raw)
        }
        None => {
            debug!("{LOGIN_TARGET_COOKIE_NAME} cookie not found");
            "/".to_string()
        }
    };

    redirect_with_cookies(&target, &cookies)
}
