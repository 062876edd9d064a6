//! Bucket proxy handler.
//! Resolves the request path to `(bucket, key)` through the alias table and
//! streams the object body without buffering it in memory.

use crate::{
    errors::AppError,
    models::object::ObjectMetadata,
    services::object_store::StoreError,
    state::{AppState, ProxySettings},
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

/// Any path behind the session gate: `/{alias}/{*key}`.
pub async fn serve_from_buckets(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Response, AppError> {
    let path = urlencoding::decode(uri.path())
        .map_err(|_| AppError::not_found("404 page not found"))?;

    let Some(resolved) = state.aliases.resolve(&path) else {
        warn!(path = %path, "no bucket alias matches request path");
        return Ok(fallback_page(&state.settings));
    };

    let key = with_index_document(&resolved.key, state.settings.index_document.as_deref());
    debug!(alias = resolved.alias, bucket = resolved.bucket, key = %key, "fetching key from bucket");

    let object = match state.store.get_object(resolved.bucket, &key).await {
        Ok(object) => object,
        Err(err @ StoreError::ObjectNotFound { .. }) => {
            debug!(error = %err, "object not found");
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let bucket = resolved.bucket.to_string();
    let stream = ReaderStream::new(object.reader).inspect(move |chunk| {
        if let Err(err) = chunk {
            error!(bucket = %bucket, key = %key, error = %err, "object copy failed mid-stream");
        }
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &object.metadata);

    Ok(response)
}

/// Append the index document to keys that name a "directory".
fn with_index_document(key: &str, index_document: Option<&str>) -> String {
    match index_document {
        Some(index) if !key.is_empty() && key.ends_with('/') => format!("{key}{index}"),
        _ => key.to_string(),
    }
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectMetadata) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size));
    if let Ok(value) = HeaderValue::from_str(&meta.http_date()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

/// Informational page for paths no alias claims.
fn fallback_page(settings: &ProxySettings) -> Response {
    let name = html_escape(&settings.instance_name);
    let body = format!(
        concat!(
            "<!DOCTYPE html><html><head><title>{name}</title></head><body>",
            "<h1>{name}</h1>",
            "<p>gcs-proxy {version} is running, but no bucket is configured for this path.</p>",
            "</body></html>"
        ),
        name = name,
        version = env!("CARGO_PKG_VERSION"),
    );
    (StatusCode::OK, Html(body)).into_response()
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
