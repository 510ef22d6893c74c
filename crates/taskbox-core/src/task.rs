use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Hard ceiling on attachments per task, counted across kept and newly
/// uploaded files combined.
pub const MAX_ATTACHMENTS: usize = 3;

/// Days a task record lives before the store's TTL reaper may collect it.
pub const RECORD_TTL_DAYS: i64 = 30;

/// The central record: a to-do item owning up to [`MAX_ATTACHMENTS`] file
/// attachments referenced by object-store key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Minted once at creation, never reassigned or reused.
    pub id: String,
    pub title: String,
    pub description: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    /// Ordered object-store keys; no duplicates, length ≤ 3.
    pub attachment_names: Vec<String>,
    /// Epoch seconds. Write-once at creation; only the store's reaper reads it.
    pub expires_at: i64,
}

impl Task {
    /// Expiry instant for a record created at `now`.
    pub fn expiry_from(now: DateTime<Utc>) -> i64 {
        (now + Duration::days(RECORD_TTL_DAYS)).timestamp()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: String,
    pub description: String,
    pub due_at: Option<DateTime<Utc>>,
}

/// Field-level overwrite: `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub done: Option<bool>,
    pub due_at: Option<DateTime<Utc>>,
    /// Names from the existing attachment set the client wants to keep.
    /// Everything not listed here is deleted; defaults to keeping nothing.
    #[serde(default)]
    pub keep_attachments: Vec<String>,
}
