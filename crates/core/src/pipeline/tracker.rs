//! Pipeline status tracker.
//!
//! Owns the per-article stage status map: initializes it at ingestion and
//! records per-stage results reported by workers. Stage completion and the
//! dispatch intent for the next stage commit in a single store transaction;
//! the outbox relay performs the actual enqueue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::audit::{AuditEvent, AuditHandle};
use crate::dispatch::WorkItem;
use crate::document::{Article, CreateArticleRequest, DocumentStore, StoreError};
use crate::metrics;
use crate::pipeline::{Stage, StageState};

/// How many version conflicts to absorb before giving up.
const MAX_CONFLICT_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Article not found: {0}")]
    NotFound(String),

    #[error("Gave up updating {stage} for article {article_id} after {attempts} version conflicts")]
    RetriesExhausted {
        article_id: String,
        stage: Stage,
        attempts: u32,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Tracks per-article pipeline status.
pub struct StatusTracker {
    store: Arc<dyn DocumentStore>,
    audit: Option<AuditHandle>,
    job_timeout_secs: u32,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn DocumentStore>, job_timeout_secs: u32) -> Self {
        Self {
            store,
            audit: None,
            job_timeout_secs,
        }
    }

    /// Attach an audit handle for event emission.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Ingest a new article.
    ///
    /// Creates the document with an all-pending stage map; the entry stage's
    /// dispatch intent is recorded in the same transaction.
    pub fn ingest(&self, request: CreateArticleRequest) -> Result<Article, TrackerError> {
        let article = self.store.create_article(request, self.job_timeout_secs)?;

        metrics::ARTICLES_INGESTED.inc();
        if let Some(ref audit) = self.audit {
            audit.try_emit(AuditEvent::ArticleIngested {
                article_id: article.id.clone(),
                title: article.title.clone(),
                source: article.source.clone(),
                raw_text_len: article.raw_text.len(),
            });
        }

        Ok(article)
    }

    /// Record the result of one stage for one article.
    ///
    /// Updates exactly one stage entry and its timestamp. When the new state
    /// is `completed` and a next stage exists, that stage's dispatch intent
    /// lands in the outbox within the same transaction. Version conflicts
    /// from concurrent writers are retried by re-reading the document.
    pub fn record_stage_result(
        &self,
        article_id: &str,
        stage: Stage,
        new_state: StageState,
        at: DateTime<Utc>,
    ) -> Result<Article, TrackerError> {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let article = self
                .store
                .get_article(article_id)?
                .ok_or_else(|| TrackerError::NotFound(article_id.to_string()))?;

            let from_state = article.pipeline_status.entry(stage).status;

            let next_intent = if new_state == StageState::Completed {
                stage
                    .next()
                    .map(|next| WorkItem::for_stage(next, article_id, self.job_timeout_secs))
            } else {
                None
            };

            match self.store.update_stage(
                article_id,
                stage,
                new_state,
                at,
                article.version,
                next_intent,
            ) {
                Ok(updated) => {
                    metrics::STAGE_TRANSITIONS
                        .with_label_values(&[stage.name(), new_state.as_str()])
                        .inc();
                    if let Some(ref audit) = self.audit {
                        audit.try_emit(AuditEvent::StageStateChanged {
                            article_id: article_id.to_string(),
                            stage: stage.name().to_string(),
                            from_state: from_state.as_str().to_string(),
                            to_state: new_state.as_str().to_string(),
                        });
                    }
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict { .. }) => {
                    metrics::VERSION_CONFLICTS.inc();
                    debug!(
                        article_id,
                        stage = stage.name(),
                        attempt,
                        "Version conflict recording stage result, retrying"
                    );
                }
                Err(StoreError::NotFound(id)) => return Err(TrackerError::NotFound(id)),
                Err(e) => return Err(TrackerError::Storage(e)),
            }
        }

        Err(TrackerError::RetriesExhausted {
            article_id: article_id.to_string(),
            stage,
            attempts: MAX_CONFLICT_RETRIES,
        })
    }
}
