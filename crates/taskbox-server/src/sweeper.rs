use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskbox_db::TaskStore;
use tracing::{error, info};

/// Background loop reaping task records whose expiry instant has passed.
///
/// Stands in for the key-value store's native TTL collection when running
/// on a backend without one. A missed sweep is harmless; expired records
/// are reaped on the next pass.
pub async fn run_sweeper(tasks: Arc<dyn TaskStore>, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        match tasks.purge_expired(Utc::now().timestamp()).await {
            Ok(0) => {}
            Ok(reaped) => info!("sweeper: reaped {reaped} expired task records"),
            Err(e) => error!("sweeper: purge failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use taskbox_core::Task;
    use taskbox_db::{SqliteTaskStore, TaskStore};

    #[tokio::test]
    async fn purge_removes_only_expired_records() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        let now = Utc::now().timestamp();

        let mut expired = task("expired");
        expired.expires_at = now - 1;
        let mut live = task("live");
        live.expires_at = now + 1000;
        store.put(&expired).await.unwrap();
        store.put(&live).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.get("expired").await.unwrap().is_none());
        assert!(store.get("live").await.unwrap().is_some());
    }

    fn task(id: &str) -> Task {
        Task {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            done: false,
            due_at: None,
            attachment_names: vec![],
            expires_at: 0,
        }
    }
}
