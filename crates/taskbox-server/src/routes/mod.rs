pub mod health;
pub mod tareas;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use taskbox_service::LocalService;
use tower_http::trace::TraceLayer;

/// Three 10 MiB files plus multipart framing overhead.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub struct InnerAppState {
    pub service: LocalService,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(service: LocalService) -> Router {
    let state: AppState = Arc::new(InnerAppState { service });
    Router::new()
        .merge(health::routes())
        .merge(tareas::routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
