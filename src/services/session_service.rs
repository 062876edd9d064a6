//! SessionGate: mints and validates the signed session cookie.
//!
//! Cookie value layout:
//!
//! ```text
//! base64url(json{"hd": <hosted domain>, "iat": <unix secs>}) "." base64url(HMAC-SHA256)
//! ```
//!
//! The MAC covers `"<cookie name>|<encoded payload>"`, so a value minted for
//! one cookie name cannot be replayed under another. Any decode failure
//! (bad layout, bad signature, bad payload, expired) is reported to callers
//! as [`SessionStatus::Missing`]: a tampered cookie forces a fresh login
//! rather than a 403.

use crate::{
    cookies::{SetCookie, get_cookie},
    models::session::Session,
};
use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::{collections::HashSet, fmt, sync::Arc};
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE_NAME: &str = "gcs-proxy-session";

/// Thirty days, matching the lifetime browsers keep the cookie around.
pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// Tolerated clock skew for cookies stamped slightly in the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session cookie is malformed")]
    Malformed,
    #[error("session cookie signature mismatch")]
    SignatureMismatch,
    #[error("session cookie expired")]
    Expired,
    #[error("session cookie encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("session cookie payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Outcome of checking a request's session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Signed by us and the hosted domain is allow-listed.
    Valid(String),
    /// Signed by us but the hosted domain is not allow-listed.
    Invalid(String),
    /// No cookie, or a cookie that does not decode.
    Missing,
}

#[derive(Clone)]
pub struct SessionGate {
    key: Arc<[u8]>,
    allowed_domains: Arc<HashSet<String>>,
    max_age_secs: i64,
}

impl fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGate")
            .field("key", &"<redacted>")
            .field("allowed_domains", &self.allowed_domains)
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

impl SessionGate {
    pub fn new(
        secret: &str,
        allowed_domains: impl IntoIterator<Item = String>,
        max_age_secs: i64,
    ) -> Self {
        Self {
            key: Arc::from(secret.as_bytes()),
            allowed_domains: Arc::new(allowed_domains.into_iter().collect()),
            max_age_secs,
        }
    }

    /// Accounts outside any Workspace domain (consumer Gmail) carry an empty
    /// hosted domain and are never allowed.
    pub fn is_allowed(&self, hosted_domain: &str) -> bool {
        !hosted_domain.is_empty() && self.allowed_domains.contains(hosted_domain)
    }

    /// Classify the session cookie carried by `headers`.
    pub fn validate(&self, headers: &HeaderMap) -> SessionStatus {
        let Some(value) = get_cookie(headers, SESSION_COOKIE_NAME) else {
            return SessionStatus::Missing;
        };

        match self.decode(value) {
            Ok(session) if self.is_allowed(&session.hosted_domain) => {
                SessionStatus::Valid(session.hosted_domain)
            }
            Ok(session) => SessionStatus::Invalid(session.hosted_domain),
            Err(err) => {
                debug!(error = %err, "discarding undecodable session cookie");
                SessionStatus::Missing
            }
        }
    }

    /// Build the `Set-Cookie` for a freshly authenticated hosted domain.
    pub fn issue_cookie(
        &self,
        hosted_domain: &str,
        secure: bool,
    ) -> Result<SetCookie, SessionError> {
        let session = Session {
            hosted_domain: hosted_domain.to_string(),
            issued_at: Utc::now().timestamp(),
        };
        let value = self.encode(&session)?;
        Ok(SetCookie::new(SESSION_COOKIE_NAME, value)
            .path("/")
            .max_age(self.max_age_secs)
            .http_only()
            .secure(secure)
            .same_site_lax())
    }

    pub fn encode(&self, session: &Session) -> Result<String, SessionError> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(session)?);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&payload).finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    pub fn decode(&self, value: &str) -> Result<Session, SessionError> {
        let (payload, signature) = value.split_once('.').ok_or(SessionError::Malformed)?;
        let signature = URL_SAFE_NO_PAD.decode(signature)?;
        self.mac(payload)
            .verify_slice(&signature)
            .map_err(|_| SessionError::SignatureMismatch)?;

        let session: Session = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload)?)?;
        let age = Utc::now().timestamp() - session.issued_at;
        if age > self.max_age_secs || age < -MAX_CLOCK_SKEW_SECS {
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can accept keys of any length");
        mac.update(SESSION_COOKIE_NAME.as_bytes());
        mac.update(b"|");
        mac.update(payload.as_bytes());
        mac
    }
}
