//! Represents an object (file) fetched from a backend bucket.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata describing a single object within a bucket.
///
/// Produced per request by an [`ObjectStore`](crate::services::object_store::ObjectStore)
/// and consumed immediately to build the response headers.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Content type (MIME type).
    pub content_type: String,

    /// Size in bytes.
    pub size: u64,

    /// Timestamp when the object was last modified.
    pub updated_at: DateTime<Utc>,
}

impl ObjectMetadata {
    /// `Last-Modified` value in RFC 1123 HTTP-date form.
    pub fn http_date(&self) -> String {
        self.updated_at
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }
}
