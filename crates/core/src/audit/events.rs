use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Article lifecycle
    ArticleIngested {
        article_id: String,
        title: Option<String>,
        source: Option<String>,
        raw_text_len: usize,
    },
    StageStateChanged {
        article_id: String,
        stage: String,
        from_state: String,
        to_state: String,
    },

    // Dispatch events
    WorkDispatched {
        article_id: String,
        job_id: String,
        queue: String,
        /// True when the queue already held a job with this identifier.
        deduplicated: bool,
    },
    DispatchFailed {
        article_id: String,
        job_id: String,
        queue: String,
        error: String,
        attempt: u32,
    },

    // Episode lifecycle
    EpisodeSaved {
        episode_id: String,
        episode_name: String,
        status: String,
    },
}

impl AuditEvent {
    /// Event type string for storage/filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::ServiceStarted { .. } => "service_started",
            AuditEvent::ServiceStopped { .. } => "service_stopped",
            AuditEvent::ArticleIngested { .. } => "article_ingested",
            AuditEvent::StageStateChanged { .. } => "stage_state_changed",
            AuditEvent::WorkDispatched { .. } => "work_dispatched",
            AuditEvent::DispatchFailed { .. } => "dispatch_failed",
            AuditEvent::EpisodeSaved { .. } => "episode_saved",
        }
    }

    /// Article ID associated with this event, if any
    pub fn article_id(&self) -> Option<&str> {
        match self {
            AuditEvent::ArticleIngested { article_id, .. }
            | AuditEvent::StageStateChanged { article_id, .. }
            | AuditEvent::WorkDispatched { article_id, .. }
            | AuditEvent::DispatchFailed { article_id, .. } => Some(article_id),
            _ => None,
        }
    }
}

/// A persisted audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Database-assigned ID
    pub id: i64,
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
    /// Event type string (for filtering)
    pub event_type: String,
    /// Associated article, if any
    pub article_id: Option<String>,
    /// Full event payload
    pub data: AuditEvent,
}
