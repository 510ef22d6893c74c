use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use crate::{ObjectMetadata, ObjectStore, StoreConfig, StoreError};

pub struct S3Store {
    bucket: Box<Bucket>,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").finish_non_exhaustive()
    }
}

impl S3Store {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let region = match (&config.endpoint_url, &config.region) {
            (Some(endpoint), _) => Region::Custom {
                region: config.region.clone().unwrap_or_else(|| "us-east-1".into()),
                endpoint: endpoint.clone(),
            },
            (None, Some(region)) => region.parse().unwrap_or(Region::UsEast1),
            (None, None) => Region::UsEast1,
        };

        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Internal(format!("credentials: {e}")))?;

        let bucket_name = config
            .bucket
            .as_deref()
            .ok_or_else(|| StoreError::Internal("bucket name required".into()))?;

        let mut bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StoreError::Internal(format!("bucket: {e}")))?;
        // Path-style addressing is what MinIO/Garage-style endpoints expect;
        // AWS itself resolves virtual-host names.
        if config.endpoint_url.is_some() {
            bucket.set_path_style();
        }

        Ok(Self { bucket })
    }

    /// A bucket handle whose requests carry the given object metadata as
    /// `x-amz-meta-*` headers.
    fn bucket_with_metadata(&self, metadata: &ObjectMetadata) -> Box<Bucket> {
        let mut bucket = self.bucket.clone();
        for (key, value) in metadata {
            bucket.add_header(&format!("x-amz-meta-{key}"), value);
        }
        bucket
    }
}

fn map_s3_error(e: S3Error) -> StoreError {
    StoreError::Internal(format!("s3: {e}"))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let bucket = self.bucket_with_metadata(metadata);
        bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let response = self.bucket.get_object(key).await.map_err(map_s3_error)?;
        if response.status_code() == 404 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if response.status_code() >= 400 {
            return Err(StoreError::Internal(format!(
                "s3 get {}: status {}",
                key,
                response.status_code()
            )));
        }
        Ok(Bytes::from(response.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.bucket.delete_object(key).await.map_err(map_s3_error)?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, StoreError> {
        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(map_s3_error)
    }

    async fn read_metadata(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        let (head, code) = self.bucket.head_object(key).await.map_err(map_s3_error)?;
        if code == 404 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if code >= 400 {
            return Err(StoreError::Internal(format!(
                "s3 head {key}: status {code}"
            )));
        }
        Ok(head.metadata.unwrap_or_default())
    }

    async fn replace_metadata(
        &self,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        // Self-copy with the REPLACE directive is the only way S3 rewrites
        // metadata without re-sending the object bytes.
        let mut bucket = self.bucket_with_metadata(metadata);
        bucket.add_header("x-amz-metadata-directive", "REPLACE");
        let code = bucket
            .copy_object_internal(key, key)
            .await
            .map_err(map_s3_error)?;
        if code == 404 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if code >= 300 {
            return Err(StoreError::Internal(format!(
                "s3 copy {key}: status {code}"
            )));
        }
        Ok(())
    }
}
