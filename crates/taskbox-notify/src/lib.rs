use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notify error: {0}")]
    Publish(String),
}

/// Fire-and-forget publication of human-readable event strings to a topic.
///
/// Publish failures must never roll back or fail the mutation that
/// triggered them; callers log the error and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, message: &str) -> Result<(), NotifyError>;
}

/// POSTs `{"message": ...}` to a webhook-style topic URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    topic_url: String,
}

impl WebhookNotifier {
    pub fn new(topic_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            topic_url: topic_url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, message: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.topic_url)
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .map_err(|e| NotifyError::Publish(format!("post: {e}")))?;
        if !resp.status().is_success() {
            return Err(NotifyError::Publish(format!(
                "topic returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Used when no topic is configured; drops messages after a debug log.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, message: &str) -> Result<(), NotifyError> {
        debug!("notification dropped (no topic configured): {message}");
        Ok(())
    }
}

// -- Configuration --

/// Configuration for the notification topic.
pub struct NotifyConfig {
    /// Topic URL notifications are POSTed to. `None` disables publishing.
    pub topic_url: Option<String>,
}

impl NotifyConfig {
    pub fn from_env() -> Self {
        Self {
            topic_url: std::env::var("TASKBOX_NOTIFY_URL").ok(),
        }
    }
}

// -- Factory --

/// Create a `Notifier` from configuration.
pub fn create_notifier(config: &NotifyConfig) -> Arc<dyn Notifier> {
    match &config.topic_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(NoopNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use tokio::net::TcpListener;

    async fn spawn_topic(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/topic",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    status
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/topic"), hits)
    }

    #[tokio::test]
    async fn webhook_publishes_to_topic() {
        let (url, hits) = spawn_topic(StatusCode::OK).await;
        let notifier = WebhookNotifier::new(&url);
        notifier.publish("task t-1 has been created").await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn webhook_surfaces_non_success_status() {
        let (url, _hits) = spawn_topic(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = WebhookNotifier::new(&url);
        let err = notifier.publish("boom").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn noop_always_succeeds() {
        NoopNotifier.publish("anything").await.unwrap();
    }

    #[test]
    fn factory_picks_backend_from_config() {
        // With a topic URL the webhook backend is used; the only observable
        // difference without a live topic is that publish can fail, so just
        // exercise both construction paths.
        let _webhook = create_notifier(&NotifyConfig {
            topic_url: Some("http://localhost:1/topic".into()),
        });
        let _noop = create_notifier(&NotifyConfig { topic_url: None });
    }
}
