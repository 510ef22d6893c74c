use async_trait::async_trait;
use bytes::Bytes;
use taskbox_core::{CreateTask, Task, UpdateTask};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A file received by the upload collaborator, already size- and
/// type-screened, ready to land in the object store under its original name.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// The task lifecycle operations the HTTP surface exposes.
///
/// `LocalService` orchestrates the record store, the object store and the
/// notifier behind this trait.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, ServiceError>;

    async fn get_task(&self, id: &str) -> Result<Task, ServiceError>;

    /// Mint an id, upload the files tagged with it, persist the record,
    /// notify. Validation happens before the first upload.
    async fn create_task(
        &self,
        input: &CreateTask,
        files: Vec<UploadedFile>,
    ) -> Result<Task, ServiceError>;

    /// Reconcile the attachment set against `update.keep_attachments` plus
    /// `files`, then overwrite the record field-by-field.
    async fn update_task(
        &self,
        id: &str,
        update: &UpdateTask,
        files: Vec<UploadedFile>,
    ) -> Result<Task, ServiceError>;

    /// Remove the record and its attachment objects. Idempotent.
    async fn delete_task(&self, id: &str) -> Result<(), ServiceError>;

    async fn list_attachments(&self, task_id: &str) -> Result<Vec<String>, ServiceError>;

    /// Issue a signed URL for one attachment and bump its download counter.
    async fn download_attachment(&self, task_id: &str, name: &str)
        -> Result<String, ServiceError>;
}
