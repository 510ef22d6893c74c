mod sqlite;

pub use sqlite::SqliteTaskStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use taskbox_core::Task;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("task store error: {0}")]
    Internal(String),
}

/// One page of a cursor scan. `next_cursor` is `None` on the last page.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub tasks: Vec<Task>,
    pub next_cursor: Option<String>,
}

const SCAN_PAGE_SIZE: u32 = 100;

/// Key-value access to the task table, one item per task id.
///
/// All operations are single-item; there is no conditional-write primitive,
/// so concurrent writers to the same id are last-write-wins.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or fully replace the record for `task.id`.
    async fn put(&self, task: &Task) -> Result<(), DbError>;

    /// Fetch one record. `Ok(None)` when absent.
    async fn get(&self, id: &str) -> Result<Option<Task>, DbError>;

    /// Remove a record. Deleting an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<(), DbError>;

    /// One page of records in id order, starting after `cursor`.
    async fn scan(&self, cursor: Option<&str>, limit: u32) -> Result<ScanPage, DbError>;

    /// Remove records whose expiry instant has passed. Returns the count reaped.
    async fn purge_expired(&self, now_epoch: i64) -> Result<u64, DbError>;

    /// Drain every page of `scan`. Unbounded single pass; fine at the small
    /// record counts this service is meant for.
    async fn scan_all(&self) -> Result<Vec<Task>, DbError> {
        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.scan(cursor.as_deref(), SCAN_PAGE_SIZE).await?;
            tasks.extend(page.tasks);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(tasks)
    }
}

// -- Configuration --

/// Configuration for the task store backend.
pub struct DbConfig {
    /// SQLite file path. `None` uses the default data directory.
    pub sqlite_path: Option<String>,
}

impl DbConfig {
    /// Build from environment variables.
    pub fn from_env() -> Self {
        Self {
            sqlite_path: std::env::var("TASKBOX_DB_PATH").ok(),
        }
    }
}

pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("taskbox")
}

// -- Factory --

/// Create a `TaskStore` from configuration.
pub fn create_store(config: &DbConfig) -> Result<Arc<dyn TaskStore>, DbError> {
    Ok(Arc::new(SqliteTaskStore::open(config)?))
}
