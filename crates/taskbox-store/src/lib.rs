mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// String metadata carried on the side of each stored object.
pub type ObjectMetadata = HashMap<String, String>;

// Metadata keys the gateway owns. Nothing else writes these.
pub const META_TASK_ID: &str = "task-id";
pub const META_ORIGINAL_NAME: &str = "original-name";
pub const META_DOWNLOAD_COUNT: &str = "download-count";

/// Default lifetime of an issued access URL.
pub const ACCESS_URL_TTL_SECS: u32 = 3600;

/// Metadata for a freshly uploaded attachment: owning task, original
/// filename, zeroed download counter.
pub fn attachment_metadata(task_id: &str, original_name: &str) -> ObjectMetadata {
    let mut meta = ObjectMetadata::new();
    meta.insert(META_TASK_ID.into(), task_id.into());
    meta.insert(META_ORIGINAL_NAME.into(), original_name.into());
    meta.insert(META_DOWNLOAD_COUNT.into(), "0".into());
    meta
}

/// A store for opaque blobs keyed by string paths, each blob carrying a
/// small string metadata map on the side.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (create or overwrite) an object together with its metadata.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError>;

    /// Read an object. Returns `StoreError::NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Delete an object. No-op if absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Issue a time-limited URL granting read access to one object.
    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, StoreError>;

    /// Read an object's metadata map. `NotFound` when the object is absent.
    async fn read_metadata(&self, key: &str) -> Result<ObjectMetadata, StoreError>;

    /// Replace an object's metadata wholesale, leaving its bytes untouched.
    async fn replace_metadata(
        &self,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError>;

    /// Bump the advisory download counter and return the new value.
    ///
    /// Read-modify-write with no atomicity: concurrent increments on the
    /// same key can lose updates. A missing or unparseable counter reads
    /// as 0. `NotFound` means the object itself is gone.
    async fn increment_download_count(&self, key: &str) -> Result<u64, StoreError> {
        let mut meta = self.read_metadata(key).await?;
        let count: u64 = meta
            .get(META_DOWNLOAD_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let next = count + 1;
        meta.insert(META_DOWNLOAD_COUNT.to_string(), next.to_string());
        self.replace_metadata(key, &meta).await?;
        Ok(next)
    }
}

// -- Configuration --

/// Configuration for the object store backend.
pub struct StoreConfig {
    /// S3-compatible endpoint URL (e.g., "http://127.0.0.1:9000").
    /// When `None` and a region is set, the AWS endpoint for that region
    /// is used; when neither is set, fall back to local filesystem.
    pub endpoint_url: Option<String>,
    /// S3 region (e.g., "eu-west-1").
    pub region: Option<String>,
    /// S3 bucket name.
    pub bucket: Option<String>,
    /// AWS access key ID.
    pub access_key_id: Option<String>,
    /// AWS secret access key.
    pub secret_access_key: Option<String>,
    /// Local filesystem base directory (used when S3 is not configured).
    pub local_data_dir: Option<String>,
}

impl StoreConfig {
    /// Build from environment variables, preferring `TASKBOX_S3_*` over the
    /// conventional `AWS_*` / `S3_BUCKET_NAME` names.
    pub fn from_env() -> Self {
        Self {
            endpoint_url: std::env::var("TASKBOX_S3_ENDPOINT")
                .or_else(|_| std::env::var("AWS_ENDPOINT_URL"))
                .ok(),
            region: std::env::var("TASKBOX_S3_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .ok(),
            bucket: std::env::var("TASKBOX_S3_BUCKET")
                .or_else(|_| std::env::var("S3_BUCKET_NAME"))
                .ok(),
            access_key_id: std::env::var("TASKBOX_S3_ACCESS_KEY_ID")
                .or_else(|_| std::env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_access_key: std::env::var("TASKBOX_S3_SECRET_ACCESS_KEY")
                .or_else(|_| std::env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            local_data_dir: None,
        }
    }

    pub fn is_s3(&self) -> bool {
        (self.endpoint_url.is_some() || self.region.is_some())
            && self.access_key_id.is_some()
            && self.secret_access_key.is_some()
            && self.bucket.is_some()
    }
}

// -- Factory --

/// Create an `ObjectStore` from configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    if config.is_s3() {
        #[cfg(feature = "s3")]
        {
            Ok(Arc::new(S3Store::new(config)?))
        }
        #[cfg(not(feature = "s3"))]
        {
            Err(StoreError::Internal(
                "S3 configuration detected but the 's3' feature is not enabled".into(),
            ))
        }
    } else {
        Ok(Arc::new(LocalStore::new(config)))
    }
}
