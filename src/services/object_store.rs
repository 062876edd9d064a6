//! The object-store capability the router reads from.
//!
//! Backends report metadata together with an open reader; the reader is
//! owned by the response body and closed when that body is dropped.

use crate::models::object::ObjectMetadata;
use async_trait::async_trait;
use std::{fmt, io, pin::Pin};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Byte stream for a single object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{key} not found in bucket {bucket}")]
    ObjectNotFound { bucket: String, key: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An object opened for reading.
pub struct StoredObject {
    pub metadata: ObjectMetadata,
    pub reader: ObjectReader,
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch metadata for `bucket/key` and open its body.
    ///
    /// Must return [`StoreError::ObjectNotFound`] when the key does not exist.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<StoredObject>;
}
