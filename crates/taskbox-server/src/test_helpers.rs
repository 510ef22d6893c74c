use std::sync::Arc;

use axum::Router;
use taskbox_db::SqliteTaskStore;
use taskbox_notify::NoopNotifier;
use taskbox_service::LocalService;
use taskbox_store::{ObjectStore, StoreConfig};

/// Build a test router with in-memory SQLite, a tempdir object store and a
/// noop notifier.
pub fn test_router() -> Router {
    build_test_app().0
}

/// Like `test_router`, but also hands back the object store so tests can
/// observe side effects directly.
pub fn build_test_app() -> (Router, Arc<dyn ObjectStore>) {
    let tasks = Arc::new(SqliteTaskStore::open_in_memory().unwrap());
    let store_config = StoreConfig {
        endpoint_url: None,
        region: None,
        bucket: None,
        access_key_id: None,
        secret_access_key: None,
        local_data_dir: Some(
            tempfile::tempdir()
                .unwrap()
                .keep()
                .to_string_lossy()
                .to_string(),
        ),
    };
    let objects = taskbox_store::create_store(&store_config).unwrap();
    let service = LocalService::new(tasks, objects.clone(), Arc::new(NoopNotifier));
    (crate::routes::build_router(service), objects)
}
