use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use taskbox_core::Task;

use crate::{DbConfig, DbError, ScanPage, TaskStore};

/// SQLite-backed task table.
///
/// The table is used strictly as a key-value item store: one row per task id,
/// the record itself serialized as a JSON document. `expires_at` is mirrored
/// into its own column so the reaper can purge without decoding records.
#[derive(Clone)]
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("taskbox.db"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbError::Internal(format!("mkdir {}: {e}", parent.display())))?;
        }
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).map_err(|e| DbError::Internal(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| DbError::Internal(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().map_err(|e| DbError::Internal(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn init_schema(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id TEXT PRIMARY KEY,
                    record TEXT NOT NULL,
                    expires_at INTEGER NOT NULL
                 );",
            )
            .map_err(|e| DbError::Internal(e.to_string()))
        })
    }
}

fn decode_record(record: &str) -> Result<Task, DbError> {
    serde_json::from_str(record).map_err(|e| DbError::Internal(format!("decode record: {e}")))
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn put(&self, task: &Task) -> Result<(), DbError> {
        let record = serde_json::to_string(task)
            .map_err(|e| DbError::Internal(format!("encode record: {e}")))?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, record, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     record = excluded.record,
                     expires_at = excluded.expires_at",
                params![task.id, record, task.expires_at],
            )
            .map_err(|e| DbError::Internal(e.to_string()))?;
            Ok(())
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, DbError> {
        let record: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT record FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DbError::Internal(e.to_string()))
        })?;
        record.as_deref().map(decode_record).transpose()
    }

    async fn delete(&self, id: &str) -> Result<(), DbError> {
        // Absent ids are indistinguishable from success on purpose.
        self.with_conn(|conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])
                .map_err(|e| DbError::Internal(e.to_string()))?;
            Ok(())
        })
    }

    async fn scan(&self, cursor: Option<&str>, limit: u32) -> Result<ScanPage, DbError> {
        let records: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT record FROM tasks
                     WHERE ?1 IS NULL OR id > ?1
                     ORDER BY id
                     LIMIT ?2",
                )
                .map_err(|e| DbError::Internal(e.to_string()))?;
            let rows = stmt
                .query_map(params![cursor, limit], |row| row.get(0))
                .map_err(|e| DbError::Internal(e.to_string()))?;
            rows.collect::<Result<Vec<String>, _>>()
                .map_err(|e| DbError::Internal(e.to_string()))
        })?;

        let tasks = records
            .iter()
            .map(|r| decode_record(r))
            .collect::<Result<Vec<Task>, DbError>>()?;
        let next_cursor = if tasks.len() == limit as usize {
            tasks.last().map(|t| t.id.clone())
        } else {
            None
        };
        Ok(ScanPage { tasks, next_cursor })
    }

    async fn purge_expired(&self, now_epoch: i64) -> Result<u64, DbError> {
        self.with_conn(|conn| {
            let reaped = conn
                .execute("DELETE FROM tasks WHERE expires_at <= ?1", params![now_epoch])
                .map_err(|e| DbError::Internal(e.to_string()))?;
            Ok(reaped as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(id: &str) -> Task {
        Task {
            id: id.into(),
            title: format!("task {id}"),
            description: String::new(),
            done: false,
            due_at: None,
            attachment_names: vec![],
            expires_at: Task::expiry_from(Utc::now()),
        }
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        let task = sample("a");
        store.put(&task).await.unwrap();

        let fetched = store.get("a").await.unwrap().unwrap();
        assert_eq!(fetched.id, "a");
        assert_eq!(fetched.title, "task a");
        assert_eq!(fetched.expires_at, task.expires_at);
    }

    #[tokio::test]
    async fn get_absent_is_none() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites_last_write_wins() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        store.put(&sample("a")).await.unwrap();

        let mut second = sample("a");
        second.title = "rewritten".into();
        second.attachment_names = vec!["f.pdf".into()];
        store.put(&second).await.unwrap();

        let fetched = store.get("a").await.unwrap().unwrap();
        assert_eq!(fetched.title, "rewritten");
        assert_eq!(fetched.attachment_names, vec!["f.pdf".to_string()]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        store.put(&sample("a")).await.unwrap();

        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        // Second delete of the same id must not error.
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn scan_pages_in_id_order() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        for id in ["c", "a", "e", "b", "d"] {
            store.put(&sample(id)).await.unwrap();
        }

        let first = store.scan(None, 2).await.unwrap();
        assert_eq!(
            first.tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        let cursor = first.next_cursor.unwrap();
        assert_eq!(cursor, "b");

        let second = store.scan(Some(&cursor), 2).await.unwrap();
        assert_eq!(
            second.tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["c", "d"]
        );

        let third = store.scan(second.next_cursor.as_deref(), 2).await.unwrap();
        assert_eq!(third.tasks.len(), 1);
        assert!(third.next_cursor.is_none());
    }

    #[tokio::test]
    async fn scan_all_drains_every_page() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        for i in 0..7 {
            store.put(&sample(&format!("t{i}"))).await.unwrap();
        }
        let all = store.scan_all().await.unwrap();
        assert_eq!(all.len(), 7);
    }

    #[tokio::test]
    async fn purge_expired_reaps_only_past_expiries() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        let now = Utc::now().timestamp();

        let mut stale = sample("stale");
        stale.expires_at = now - 10;
        let mut live = sample("live");
        live.expires_at = now + 10;
        store.put(&stale).await.unwrap();
        store.put(&live).await.unwrap();

        let reaped = store.purge_expired(now).await.unwrap();
        assert_eq!(reaped, 1);
        assert!(store.get("stale").await.unwrap().is_none());
        assert!(store.get("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn open_path_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");
        {
            let store = SqliteTaskStore::open_path(&path).unwrap();
            store.put(&sample("a")).await.unwrap();
        }
        let store = SqliteTaskStore::open_path(&path).unwrap();
        assert!(store.get("a").await.unwrap().is_some());
    }
}
