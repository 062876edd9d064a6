//! GcsStore: reads objects from Google Cloud Storage buckets.
//!
//! One client is built per configured bucket at startup. Credentials come
//! from the service-account JSON file when one is configured, otherwise
//! from the environment (`GOOGLE_SERVICE_ACCOUNT`, application default
//! credentials).

use crate::{
    models::object::ObjectMetadata,
    services::{
        filesystem_store::guess_content_type,
        object_store::{ObjectStore, StoreError, StoreResult, StoredObject},
    },
};
use ::object_store::{
    Attribute, ObjectStore as CloudObjectStore, gcp::GoogleCloudStorageBuilder, path::Path,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::{collections::HashMap, fmt, io, sync::Arc};
use tokio_util::io::StreamReader;
use tracing::{debug, error};

#[derive(Clone)]
pub struct GcsStore {
    buckets: HashMap<String, Arc<dyn CloudObjectStore>>,
}

impl fmt::Debug for GcsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.buckets.keys().collect();
        names.sort();
        f.debug_struct("GcsStore").field("buckets", &names).finish()
    }
}

impl GcsStore {
    /// Build a GCS client for every bucket name in `buckets`.
    pub fn connect<I>(
        buckets: I,
        service_account_file: Option<&std::path::Path>,
    ) -> StoreResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut clients: HashMap<String, Arc<dyn CloudObjectStore>> = HashMap::new();
        for bucket in buckets {
            let bucket = bucket.into();
            if clients.contains_key(&bucket) {
                continue;
            }
            let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&bucket);
            if let Some(path) = service_account_file {
                builder = builder.with_service_account_path(path.to_string_lossy());
            }
            let client = builder.build().map_err(|err| {
                StoreError::Backend(format!("configuring GCS bucket {bucket}: {err}"))
            })?;
            clients.insert(bucket, Arc::new(client));
        }
        Ok(Self { buckets: clients })
    }

    /// Wrap already-built clients keyed by bucket name.
    pub fn from_clients(buckets: HashMap<String, Arc<dyn CloudObjectStore>>) -> Self {
        Self { buckets }
    }

    fn not_found(bucket: &str, key: &str) -> StoreError {
        StoreError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        let Some(client) = self.buckets.get(bucket) else {
            debug!(bucket, "bucket has no configured client");
            return Err(Self::not_found(bucket, key));
        };
        if key.is_empty() {
            return Err(Self::not_found(bucket, key));
        }

        let location = Path::from(key);
        let result = match client.get(&location).await {
            Ok(result) => result,
            Err(::object_store::Error::NotFound { .. }) => {
                return Err(Self::not_found(bucket, key));
            }
            Err(err) => {
                error!(bucket, key, error = %err, "GCS read failed");
                return Err(StoreError::Backend(err.to_string()));
            }
        };

        let content_type = match result.attributes.get(&Attribute::ContentType) {
            Some(value) => {
                let value: &str = value.as_ref();
                value.to_string()
            }
            None => guess_content_type(std::path::Path::new(key)),
        };
        let metadata = ObjectMetadata {
            key: key.to_string(),
            content_type,
            size: result.meta.size,
            updated_at: result.meta.last_modified,
        };

        let stream = result.into_stream().map_err(io::Error::other);
        Ok(StoredObject {
            metadata,
            reader: Box::pin(StreamReader::new(stream)),
        })
    }
}
