//! Work dispatch types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The queueing substrate could not be reached.
    #[error("Queue unreachable: {0}")]
    Unreachable(String),

    /// The queue rejected the submission.
    #[error("Queue rejected job {job_id}: {reason}")]
    Rejected { job_id: String, reason: String },

    /// Backend-level failure (storage, protocol).
    #[error("Queue backend error: {0}")]
    Backend(String),
}

/// A unit of work to be made visible to an external worker pool.
///
/// The job identifier is derived deterministically from stage and article so
/// re-dispatching the same stage for the same article is deduplicated by the
/// queue rather than by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    /// Deterministic job identifier (`"{stage}_{article_id}"`).
    pub job_id: String,
    /// Name of the queue the stage's worker pool consumes.
    pub queue: String,
    /// The stage this job executes.
    pub stage: Stage,
    /// The article the work applies to.
    pub article_id: String,
    /// Advisory timeout in seconds; exceeding it abandons the queued job.
    pub timeout_secs: u32,
}

impl WorkItem {
    /// Build the work item for one stage of one article.
    pub fn for_stage(stage: Stage, article_id: &str, timeout_secs: u32) -> Self {
        Self {
            job_id: format!("{}_{}", stage.name(), article_id),
            queue: stage.queue_name().to_string(),
            stage,
            article_id: article_id.to_string(),
            timeout_secs,
        }
    }
}

/// Acknowledgment of a dispatched unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchAck {
    pub job_id: String,
    /// True when the queue already held a job with this identifier.
    pub deduplicated: bool,
}

/// A dispatch intent waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDispatch {
    /// Outbox row identifier.
    pub outbox_id: i64,
    /// The work to enqueue.
    pub item: WorkItem,
    /// Enqueue attempts so far.
    pub attempts: u32,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
}
