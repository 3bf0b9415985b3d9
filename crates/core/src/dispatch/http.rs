//! Remote queue service backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{DispatchAck, DispatchError, WorkItem, WorkQueue};
use crate::config::HttpQueueConfig;

/// Work queue backed by a remote queue service over HTTP.
///
/// Jobs are submitted with an idempotent `PUT` keyed by job id: the service
/// answers `201 Created` for a new job and `200 OK` when it already holds one
/// with that id.
pub struct HttpWorkQueue {
    client: Client,
    config: HttpQueueConfig,
}

#[derive(Serialize)]
struct EnqueueBody<'a> {
    queue: &'a str,
    stage: &'a str,
    article_id: &'a str,
    timeout_secs: u32,
}

impl HttpWorkQueue {
    /// Create a new HttpWorkQueue with the given configuration.
    pub fn new(config: HttpQueueConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn job_url(&self, item: &WorkItem) -> String {
        format!(
            "{}/queues/{}/jobs/{}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&item.queue),
            urlencoding::encode(&item.job_id),
        )
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        }
    }
}

#[async_trait]
impl WorkQueue for HttpWorkQueue {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn enqueue(&self, item: &WorkItem) -> Result<DispatchAck, DispatchError> {
        let url = self.job_url(item);
        debug!(job_id = %item.job_id, queue = %item.queue, "Enqueueing job");

        let body = EnqueueBody {
            queue: &item.queue,
            stage: item.stage.name(),
            article_id: &item.article_id,
            timeout_secs: item.timeout_secs,
        };

        let response = self
            .apply_auth(self.client.put(&url).json(&body))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    DispatchError::Unreachable(e.to_string())
                } else {
                    DispatchError::Backend(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            // 200 means the service already held this job id
            return Ok(DispatchAck {
                job_id: item.job_id.clone(),
                deduplicated: status == reqwest::StatusCode::OK,
            });
        }

        let reason = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(DispatchError::Rejected {
                job_id: item.job_id.clone(),
                reason: format!("HTTP {}: {}", status, reason),
            })
        } else {
            Err(DispatchError::Backend(format!(
                "HTTP {}: {}",
                status, reason
            )))
        }
    }

    async fn ping(&self) -> Result<(), DispatchError> {
        let url = format!("{}/health", self.config.url.trim_end_matches('/'));

        let response = self
            .apply_auth(self.client.get(&url))
            .send()
            .await
            .map_err(|e| DispatchError::Unreachable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DispatchError::Unreachable(format!(
                "HTTP {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    fn test_queue() -> HttpWorkQueue {
        HttpWorkQueue::new(HttpQueueConfig {
            url: "http://localhost:7000/".to_string(),
            api_key: Some("key".to_string()),
            timeout_secs: 5,
        })
    }

    #[test]
    fn test_job_url_strips_trailing_slash() {
        let queue = test_queue();
        let item = WorkItem::for_stage(Stage::Normalize, "a-1", 600);
        assert_eq!(
            queue.job_url(&item),
            "http://localhost:7000/queues/normalize/jobs/normalize_a-1"
        );
    }

    #[test]
    fn test_backend_name() {
        assert_eq!(test_queue().backend_name(), "http");
    }

    #[tokio::test]
    async fn test_enqueue_unreachable_service_fails_loudly() {
        // Nothing listens on this port; the dispatcher must surface it
        let queue = HttpWorkQueue::new(HttpQueueConfig {
            url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            timeout_secs: 1,
        });
        let item = WorkItem::for_stage(Stage::Normalize, "a-1", 600);

        let result = queue.enqueue(&item).await;
        assert!(matches!(
            result,
            Err(DispatchError::Unreachable(_)) | Err(DispatchError::Backend(_))
        ));
    }
}
