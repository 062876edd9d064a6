//! FilesystemStore: serves bucket objects from a local directory tree laid
//! out as `root/{bucket}/{key}`.
//!
//! Useful for buckets synced to disk (e.g. with `gsutil rsync`) and for local
//! development.

use crate::{
    models::object::ObjectMetadata,
    services::object_store::{ObjectStore, StoreError, StoreResult, StoredObject},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    io,
    path::{Component, Path, PathBuf},
};
use tokio::fs::{self, File};
use tracing::debug;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Debug)]
pub struct FilesystemStore {
    /// Directory holding one sub-directory per bucket.
    pub base_path: PathBuf,
}

impl FilesystemStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Whether `segment` can be used as a path component below `base_path`.
    ///
    /// Rejects empty values, absolute paths, `..` components, backslashes and
    /// control characters.
    fn is_safe(segment: &str) -> bool {
        !segment.is_empty()
            && segment.len() <= MAX_OBJECT_KEY_LEN
            && !segment.starts_with('/')
            && !Path::new(segment)
                .components()
                .any(|c| matches!(c, Component::ParentDir))
            && !segment
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\')
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.base_path.join(bucket).join(key)
    }

    fn not_found(bucket: &str, key: &str) -> StoreError {
        StoreError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        if !Self::is_safe(bucket) || bucket.contains('/') || !Self::is_safe(key) {
            debug!(bucket, key, "rejecting key that cannot name an object");
            return Err(Self::not_found(bucket, key));
        }

        let path = self.object_path(bucket, key);
        let attrs = match fs::metadata(&path).await {
            Ok(attrs) if attrs.is_file() => attrs,
            Ok(_) => return Err(Self::not_found(bucket, key)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Self::not_found(bucket, key));
            }
            Err(err) => return Err(err.into()),
        };

        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                Self::not_found(bucket, key)
            } else {
                StoreError::Io(err)
            }
        })?;

        let updated_at: DateTime<Utc> = attrs.modified()?.into();
        let metadata = ObjectMetadata {
            key: key.to_string(),
            content_type: guess_content_type(&path),
            size: attrs.len(),
            updated_at,
        };

        Ok(StoredObject {
            metadata,
            reader: Box::pin(file),
        })
    }
}

pub(crate) fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}
