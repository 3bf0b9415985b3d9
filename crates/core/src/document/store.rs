//! Document storage trait and error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::dispatch::{PendingDispatch, WorkItem};
use crate::document::{Article, Chunk, ChunkStatus, CreateArticleRequest, Episode, Summary};
use crate::pipeline::{Stage, StageState};

/// Error type for document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document with the given identity.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A conditional update observed a different version than expected.
    #[error("Version conflict on article {article_id}: expected version {expected}")]
    VersionConflict { article_id: String, expected: i64 },

    /// Underlying database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Document (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for document storage backends.
///
/// Readers treat "not found" as a legitimate `None`; only callers that
/// require the document to exist map it to an error. All mutation happens
/// through pipeline-owned writers; query paths never call the `save_*`
/// methods.
pub trait DocumentStore: Send + Sync {
    /// Create a new article with an all-pending stage map and, in the same
    /// transaction, record the dispatch intent for the entry stage.
    fn create_article(
        &self,
        request: CreateArticleRequest,
        timeout_secs: u32,
    ) -> Result<Article, StoreError>;

    /// Get an article by ID.
    fn get_article(&self, id: &str) -> Result<Option<Article>, StoreError>;

    /// Upsert an article: insert, or full-document replace on identity
    /// conflict. Bumps the stored version.
    fn save_article(&self, article: &Article) -> Result<(), StoreError>;

    /// Conditionally update one stage entry of an article's status map.
    ///
    /// Fails with [`StoreError::VersionConflict`] when `expected_version`
    /// does not match the stored row. When `next_intent` is present it is
    /// recorded in the outbox within the same transaction as the update.
    fn update_stage(
        &self,
        id: &str,
        stage: Stage,
        state: StageState,
        at: DateTime<Utc>,
        expected_version: i64,
        next_intent: Option<WorkItem>,
    ) -> Result<Article, StoreError>;

    /// Upsert an episode record.
    fn save_episode(&self, episode: &Episode) -> Result<String, StoreError>;

    /// Get an episode by ID.
    fn get_episode(&self, id: &str) -> Result<Option<Episode>, StoreError>;

    /// Upsert a chunk.
    fn save_chunk(&self, chunk: &Chunk) -> Result<String, StoreError>;

    /// List chunks of an article, optionally filtered by recombination
    /// status.
    fn list_chunks(
        &self,
        article_id: &str,
        status: Option<ChunkStatus>,
    ) -> Result<Vec<Chunk>, StoreError>;

    /// Upsert a summary.
    fn save_summary(&self, summary: &Summary) -> Result<String, StoreError>;

    /// Find the combined summary for an article.
    fn find_summary_for_article(&self, article_id: &str) -> Result<Option<Summary>, StoreError>;

    /// Dispatch intents not yet acknowledged by the queue, oldest first.
    fn pending_dispatches(&self, limit: i64) -> Result<Vec<PendingDispatch>, StoreError>;

    /// Mark an outbox row as dispatched.
    fn mark_dispatched(&self, outbox_id: i64) -> Result<(), StoreError>;

    /// Record a failed enqueue attempt; the row stays pending for retry.
    fn record_dispatch_failure(&self, outbox_id: i64, error: &str) -> Result<(), StoreError>;

    /// Number of dispatch intents still waiting.
    fn count_pending_dispatches(&self) -> Result<i64, StoreError>;
}

/// Stamp a fresh article from an ingestion request.
pub(crate) fn article_from_request(request: CreateArticleRequest, now: DateTime<Utc>) -> Article {
    Article {
        id: uuid::Uuid::new_v4().to_string(),
        title: request.title,
        url: request.url,
        raw_text: request.raw_text,
        source: request.source,
        status: crate::document::ARTICLE_STATUS_INGESTED.to_string(),
        pipeline_status: crate::pipeline::StageMap::new(),
        script: None,
        audio_url: None,
        published_at: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}
