//! Absolute URLs for the host the browser is talking to.
//!
//! Redirects and the OAuth callback URL are derived from the inbound request
//! so one process can sit behind several front-end hostnames.

use axum::http::{HeaderMap, Uri, header::HOST};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Scheme and authority of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    /// Derive the origin from `X-Forwarded-Proto` (default `http`) and the
    /// `Host` header, falling back to the URI authority, then `fallback_host`.
    pub fn from_request(headers: &HeaderMap, uri: &Uri, fallback_host: &str) -> Self {
        let scheme = headers
            .get(FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| v == "http" || v == "https")
            .unwrap_or_else(|| "http".to_string());

        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| fallback_host.to_string());

        Self { scheme, host }
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// Absolute URL for `path` on this origin.
    pub fn resolve(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, path)
    }
}
