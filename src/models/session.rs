//! The payload carried by the signed session cookie.

use serde::{Deserialize, Serialize};

/// An authenticated browser session.
///
/// The hosted domain is the only authorization attribute; `issued_at` lets
/// the gate reject cookies older than the configured maximum age.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Organizational domain reported by the identity provider (`hd`).
    #[serde(rename = "hd")]
    pub hosted_domain: String,

    /// Unix timestamp (seconds) at which the cookie was minted.
    #[serde(rename = "iat")]
    pub issued_at: i64,
}
