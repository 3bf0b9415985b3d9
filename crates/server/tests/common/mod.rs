//! Common test utilities for in-process API testing.
//!
//! Builds the full router over in-memory stores and a mock work queue, so
//! tests can drive the HTTP surface without binding a port or reaching any
//! external infrastructure.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use castline_core::testing::MockWorkQueue;
use castline_core::{
    create_audit_system, AuditStore, Config, DocumentStore, OutboxRelay, QueryService,
    SqliteAuditStore, SqliteDocumentStore, Stage, StageState, StatusTracker, WorkQueue,
};

use castline_server::api::create_router;
use castline_server::state::AppState;

/// Test fixture with an in-process router and controllable dependencies.
pub struct TestFixture {
    /// The axum router under test
    pub router: Router,
    /// Backing document store (shared with the router)
    pub store: Arc<SqliteDocumentStore>,
    /// Mock work queue observed by the relay
    pub queue: Arc<MockWorkQueue>,
    /// The outbox relay (not started; drain it explicitly)
    pub relay: Arc<OutboxRelay>,
    _audit_writer: tokio::task::JoinHandle<()>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        let config = Config::default();

        let store = Arc::new(SqliteDocumentStore::in_memory().unwrap());
        let queue = Arc::new(MockWorkQueue::new());
        let audit_store: Arc<dyn AuditStore> = Arc::new(SqliteAuditStore::in_memory().unwrap());

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        let writer_handle = tokio::spawn(audit_writer.run());

        let tracker = StatusTracker::new(
            store.clone() as Arc<dyn DocumentStore>,
            config.dispatch.job_timeout_secs,
        )
        .with_audit(audit_handle.clone());
        let query = QueryService::new(store.clone() as Arc<dyn DocumentStore>);

        let relay = Arc::new(OutboxRelay::new(
            config.dispatch.clone(),
            store.clone() as Arc<dyn DocumentStore>,
            queue.clone() as Arc<dyn WorkQueue>,
            Some(audit_handle.clone()),
        ));

        let state = Arc::new(AppState::new(
            config,
            store.clone() as Arc<dyn DocumentStore>,
            tracker,
            query,
            Arc::clone(&relay),
            audit_handle,
            audit_store,
        ));

        Self {
            router: create_router(state),
            store,
            queue,
            relay,
            _audit_writer: writer_handle,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }

    /// Raw body helper for non-JSON endpoints like /metrics.
    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Record a stage result as a worker would.
    pub fn record_stage(&self, article_id: &str, stage: Stage, state: StageState) {
        let tracker = StatusTracker::new(self.store.clone() as Arc<dyn DocumentStore>, 600);
        tracker
            .record_stage_result(article_id, stage, state, Utc::now())
            .unwrap();
    }
}
