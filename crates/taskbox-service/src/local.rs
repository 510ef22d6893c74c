use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use taskbox_core::{CreateTask, Task, UpdateTask};
use taskbox_db::{DbError, TaskStore};
use taskbox_notify::Notifier;
use taskbox_store::{attachment_metadata, ObjectStore, StoreError, ACCESS_URL_TTL_SECS};
use tracing::{info, warn};

use crate::reconcile::{self, ReconcilePlan};
use crate::{ReconcileError, ServiceError, TaskService, UploadedFile};

/// Orchestrates the task lifecycle across the record store, the object
/// store and the notifier, calling each in a fixed order per workflow.
///
/// There is no transaction spanning the two stores. Update and delete
/// sequence object deletions strictly before the record write, so a failed
/// delete aborts the workflow with the old record still in place; the
/// window where some objects are gone but the record still names them is
/// accepted and surfaced as a store error.
pub struct LocalService {
    tasks: Arc<dyn TaskStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
}

impl LocalService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        objects: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tasks,
            objects,
            notifier,
        }
    }

    /// Fire and forget: a failed publish never alters the outcome of the
    /// mutation that triggered it.
    async fn notify(&self, message: String) {
        if let Err(e) = self.notifier.publish(&message).await {
            warn!("notification failed: {e}");
        }
    }

    async fn upload_files(
        &self,
        task_id: &str,
        files: &[UploadedFile],
    ) -> Result<(), ServiceError> {
        for file in files {
            let meta = attachment_metadata(task_id, &file.name);
            self.objects
                .put(&file.name, file.data.clone(), &file.content_type, &meta)
                .await
                .map_err(store_internal)?;
        }
        Ok(())
    }
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<ReconcileError> for ServiceError {
    fn from(e: ReconcileError) -> Self {
        ServiceError::InvalidInput(e.to_string())
    }
}

fn store_internal(e: StoreError) -> ServiceError {
    ServiceError::Internal(format!("object store: {e}"))
}

#[async_trait]
impl TaskService for LocalService {
    async fn list_tasks(&self) -> Result<Vec<Task>, ServiceError> {
        Ok(self.tasks.scan_all().await?)
    }

    async fn get_task(&self, id: &str) -> Result<Task, ServiceError> {
        self.tasks
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))
    }

    async fn create_task(
        &self,
        input: &CreateTask,
        files: Vec<UploadedFile>,
    ) -> Result<Task, ServiceError> {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        // Same checks an update goes through, with nothing pre-existing.
        let plan = ReconcilePlan::compute(&[], &[], &names)?;

        let now = Utc::now();
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: input.title.clone(),
            description: input.description.clone(),
            done: false,
            due_at: input.due_at,
            attachment_names: plan.final_names,
            expires_at: Task::expiry_from(now),
        };

        self.upload_files(&task.id, &files).await?;
        self.tasks.put(&task).await?;
        info!("created task {}", task.id);
        self.notify(format!("task {} has been created", task.id))
            .await;
        Ok(task)
    }

    async fn update_task(
        &self,
        id: &str,
        update: &UpdateTask,
        files: Vec<UploadedFile>,
    ) -> Result<Task, ServiceError> {
        let existing = self.get_task(id).await?;

        let new_names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let plan = ReconcilePlan::compute(
            &existing.attachment_names,
            &update.keep_attachments,
            &new_names,
        )?;

        self.upload_files(id, &files).await?;

        // The delete phase must fully settle before the record is written;
        // on failure the old record stays authoritative.
        reconcile::delete_all(&self.objects, &plan.to_delete)
            .await
            .map_err(store_internal)?;

        let task = Task {
            id: existing.id,
            title: update.title.clone().unwrap_or(existing.title),
            description: update
                .description
                .clone()
                .unwrap_or(existing.description),
            done: update.done.unwrap_or(existing.done),
            due_at: update.due_at.or(existing.due_at),
            attachment_names: plan.final_names,
            expires_at: existing.expires_at,
        };
        self.tasks.put(&task).await?;
        info!("updated task {id}");
        self.notify(format!("task {id} has been updated")).await;
        Ok(task)
    }

    async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        // Idempotent: deleting an absent task succeeds. When the record
        // exists its attachment objects go first so none are orphaned.
        if let Some(task) = self.tasks.get(id).await? {
            reconcile::delete_all(&self.objects, &task.attachment_names)
                .await
                .map_err(store_internal)?;
        }
        self.tasks.delete(id).await?;
        info!("deleted task {id}");
        self.notify(format!("task {id} has been deleted")).await;
        Ok(())
    }

    async fn list_attachments(&self, task_id: &str) -> Result<Vec<String>, ServiceError> {
        Ok(self.get_task(task_id).await?.attachment_names)
    }

    async fn download_attachment(
        &self,
        task_id: &str,
        name: &str,
    ) -> Result<String, ServiceError> {
        let task = self.get_task(task_id).await?;
        if !task.attachment_names.iter().any(|n| n == name) {
            return Err(ServiceError::NotFound(format!("attachment {name}")));
        }

        let url = self
            .objects
            .presign_get(name, ACCESS_URL_TTL_SECS)
            .await
            .map_err(|e| {
                warn!("presign {name}: {e}");
                ServiceError::NotFound(format!("attachment {name}"))
            })?;

        let count = self
            .objects
            .increment_download_count(name)
            .await
            .map_err(|e| match e {
                // The membership check passed, so a vanished object means
                // record and store disagree.
                StoreError::NotFound(_) => {
                    ServiceError::Internal(format!("attachment object {name} disappeared"))
                }
                other => store_internal(other),
            })?;
        info!("issued download url for {name} (download #{count})");
        Ok(url)
    }
}
