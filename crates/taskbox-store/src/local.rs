use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::{ObjectMetadata, ObjectStore, StoreConfig, StoreError};

/// Filesystem-backed store for development and tests. Metadata lives in a
/// JSON sidecar file next to each object.
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(config: &StoreConfig) -> Self {
        let base_dir = config
            .local_data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.meta"))
    }

    async fn require_object(&self, key: &str) -> Result<PathBuf, StoreError> {
        let path = self.resolve(key);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Ok(path),
            Ok(false) => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(StoreError::Internal(format!(
                "stat {}: {e}",
                path.display()
            ))),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("taskbox/objects")
}

async fn remove_if_present(path: &PathBuf) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Internal(format!(
            "delete {}: {e}",
            path.display()
        ))),
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Internal(format!("mkdir: {e}")))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Internal(format!("write {}: {e}", path.display())))?;

        let encoded = serde_json::to_vec(metadata)
            .map_err(|e| StoreError::Internal(format!("encode metadata: {e}")))?;
        tokio::fs::write(self.meta_path(key), encoded)
            .await
            .map_err(|e| StoreError::Internal(format!("write metadata for {key}: {e}")))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.resolve(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::Internal(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        remove_if_present(&self.resolve(key)).await?;
        remove_if_present(&self.meta_path(key)).await
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, StoreError> {
        // No signing locally; a file URL with the requested lifetime tacked
        // on keeps the shape of the real thing for dev and tests.
        let path = self.require_object(key).await?;
        debug!("issuing pseudo access url for {key}");
        Ok(format!(
            "file://{}?expires_in={expiry_secs}",
            path.display()
        ))
    }

    async fn read_metadata(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        self.require_object(key).await?;
        match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| StoreError::Internal(format!("decode metadata for {key}: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ObjectMetadata::new()),
            Err(e) => Err(StoreError::Internal(format!(
                "read metadata for {key}: {e}"
            ))),
        }
    }

    async fn replace_metadata(
        &self,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        self.require_object(key).await?;
        let encoded = serde_json::to_vec(metadata)
            .map_err(|e| StoreError::Internal(format!("encode metadata: {e}")))?;
        tokio::fs::write(self.meta_path(key), encoded)
            .await
            .map_err(|e| StoreError::Internal(format!("write metadata for {key}: {e}")))
    }
}
