//! Read-only projections over stored documents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::document::{Article, DocumentStore, StoreError};
use crate::pipeline::{OverallStatus, Stage, StageState};

/// Episode display status when script and audio are both present.
pub const EPISODE_DISPLAY_PUBLISHED: &str = "published";

/// Episode display status when only the script is present.
pub const EPISODE_DISPLAY_SCRIPT_READY: &str = "script_ready";

#[derive(Debug, Error)]
pub enum QueryError {
    /// The identifier is not syntactically well-formed.
    #[error("Invalid article id: {0}")]
    InvalidIdentifier(String),

    /// The identifier is well-formed but resolves to no stored document.
    #[error("Article not found: {0}")]
    NotFound(String),

    /// Underlying store failure; nothing is swallowed on the read paths.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        QueryError::Storage(e.to_string())
    }
}

/// Per-stage entry of a status report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageReport {
    pub stage: &'static str,
    pub status: StageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// API-facing projection of an article's pipeline status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub article_id: String,
    pub overall_status: OverallStatus,
    pub stages: Vec<StageReport>,
    pub created_at: DateTime<Utc>,
}

/// API-facing projection of an article's episode output.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeReport {
    pub article_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Read-only query service over the document store.
///
/// Both operations are pure reads: the aggregate status is recomputed on
/// every call and never cached.
pub struct QueryService {
    store: Arc<dyn DocumentStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn fetch_article(&self, article_id: &str) -> Result<Article, QueryError> {
        if uuid::Uuid::parse_str(article_id).is_err() {
            return Err(QueryError::InvalidIdentifier(article_id.to_string()));
        }

        self.store
            .get_article(article_id)?
            .ok_or_else(|| QueryError::NotFound(article_id.to_string()))
    }

    /// Current pipeline status of an article.
    pub fn get_status(&self, article_id: &str) -> Result<StatusReport, QueryError> {
        let article = self.fetch_article(article_id)?;

        let stages = Stage::ALL
            .iter()
            .map(|stage| {
                let entry = article.pipeline_status.entry(*stage);
                StageReport {
                    stage: stage.name(),
                    status: entry.status,
                    updated_at: entry.updated_at,
                }
            })
            .collect();

        Ok(StatusReport {
            article_id: article.id.clone(),
            overall_status: article.pipeline_status.overall(),
            stages,
            created_at: article.created_at,
        })
    }

    /// Episode projection of an article.
    ///
    /// The display status is derived from the outputs, independent of the
    /// stage map: `published` when script and audio are both present,
    /// `script_ready` with only a script, otherwise the stored coarse
    /// status.
    pub fn get_episode(&self, article_id: &str) -> Result<EpisodeReport, QueryError> {
        let article = self.fetch_article(article_id)?;

        let status = if article.script.is_some() && article.audio_url.is_some() {
            EPISODE_DISPLAY_PUBLISHED.to_string()
        } else if article.script.is_some() {
            EPISODE_DISPLAY_SCRIPT_READY.to_string()
        } else {
            article.status.clone()
        };

        Ok(EpisodeReport {
            article_id: article.id,
            script: article.script,
            audio_url: article.audio_url,
            status,
            published_at: article.published_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CreateArticleRequest, SqliteDocumentStore};
    use crate::pipeline::StatusTracker;

    fn setup() -> (Arc<SqliteDocumentStore>, StatusTracker, QueryService) {
        let store = Arc::new(SqliteDocumentStore::in_memory().unwrap());
        let tracker = StatusTracker::new(store.clone() as Arc<dyn DocumentStore>, 600);
        let service = QueryService::new(store.clone() as Arc<dyn DocumentStore>);
        (store, tracker, service)
    }

    fn ingest_request() -> CreateArticleRequest {
        CreateArticleRequest {
            title: Some("Example".to_string()),
            url: None,
            raw_text: "hello".to_string(),
            source: Some("tldr newsletter".to_string()),
        }
    }

    #[test]
    fn test_status_of_fresh_article() {
        let (_store, tracker, service) = setup();
        let article = tracker.ingest(ingest_request()).unwrap();

        let report = service.get_status(&article.id).unwrap();
        assert_eq!(report.article_id, article.id);
        assert_eq!(report.overall_status, OverallStatus::Pending);
        assert_eq!(report.stages.len(), 5);
        assert_eq!(
            report.stages.iter().map(|s| s.stage).collect::<Vec<_>>(),
            vec![
                "normalize",
                "summarize",
                "assemble",
                "text_to_speech",
                "publish"
            ]
        );
        assert!(report
            .stages
            .iter()
            .all(|s| s.status == StageState::Pending && s.updated_at.is_none()));
    }

    #[test]
    fn test_status_recomputes_aggregate_on_read() {
        let (_store, tracker, service) = setup();
        let article = tracker.ingest(ingest_request()).unwrap();

        tracker
            .record_stage_result(&article.id, Stage::Normalize, StageState::Completed, Utc::now())
            .unwrap();
        assert_eq!(
            service.get_status(&article.id).unwrap().overall_status,
            OverallStatus::InProgress
        );

        tracker
            .record_stage_result(&article.id, Stage::Summarize, StageState::Failed, Utc::now())
            .unwrap();
        let report = service.get_status(&article.id).unwrap();
        assert_eq!(report.overall_status, OverallStatus::Failed);
        assert_eq!(report.stages[1].status, StageState::Failed);
        assert!(report.stages[1].updated_at.is_some());
    }

    #[test]
    fn test_status_invalid_identifier() {
        let (_store, _tracker, service) = setup();

        let result = service.get_status("not-a-uuid");
        assert!(matches!(result, Err(QueryError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_status_unknown_identifier() {
        let (_store, _tracker, service) = setup();

        let id = uuid::Uuid::new_v4().to_string();
        let result = service.get_status(&id);
        assert!(matches!(result, Err(QueryError::NotFound(_))));
    }

    #[test]
    fn test_episode_published_when_script_and_audio_present() {
        let (store, tracker, service) = setup();
        let mut article = tracker.ingest(ingest_request()).unwrap();

        article.script = Some("Welcome to today's episode".to_string());
        article.audio_url = Some("https://storage.example.com/ep.mp3".to_string());
        article.published_at = Some(Utc::now());
        store.save_article(&article).unwrap();

        let report = service.get_episode(&article.id).unwrap();
        assert_eq!(report.status, EPISODE_DISPLAY_PUBLISHED);
        assert!(report.published_at.is_some());
    }

    #[test]
    fn test_episode_script_ready_when_only_script_present() {
        let (store, tracker, service) = setup();
        let mut article = tracker.ingest(ingest_request()).unwrap();

        article.script = Some("Welcome to today's episode".to_string());
        store.save_article(&article).unwrap();

        let report = service.get_episode(&article.id).unwrap();
        assert_eq!(report.status, EPISODE_DISPLAY_SCRIPT_READY);
        assert!(report.audio_url.is_none());
    }

    #[test]
    fn test_episode_falls_back_to_coarse_status() {
        let (_store, tracker, service) = setup();
        let article = tracker.ingest(ingest_request()).unwrap();

        let report = service.get_episode(&article.id).unwrap();
        assert_eq!(report.status, "ingested");
        assert!(report.script.is_none());
        assert!(report.audio_url.is_none());
    }

    #[test]
    fn test_episode_error_mapping_matches_status() {
        let (_store, _tracker, service) = setup();

        assert!(matches!(
            service.get_episode("###"),
            Err(QueryError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            service.get_episode(&uuid::Uuid::new_v4().to_string()),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_queries_do_not_mutate_state() {
        let (store, tracker, service) = setup();
        let article = tracker.ingest(ingest_request()).unwrap();

        let before = store.get_article(&article.id).unwrap().unwrap();
        service.get_status(&article.id).unwrap();
        service.get_episode(&article.id).unwrap();
        let after = store.get_article(&article.id).unwrap().unwrap();

        assert_eq!(before, after);
        assert_eq!(before.version, after.version);
    }
}
