//! Work queue trait.

use async_trait::async_trait;

use super::{DispatchAck, DispatchError, WorkItem};

/// Trait for work queue backends.
///
/// The queue substrate is at-least-once: workers may observe a job more than
/// once after a crash, but duplicate submissions with the same job identifier
/// collapse into a single unit of work. This component only makes work
/// visible; it never executes it.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Backend name for logging and the sanitized config.
    fn backend_name(&self) -> &'static str;

    /// Make a unit of work visible to the worker pool consuming its queue.
    ///
    /// Submissions are idempotent on `job_id`; the ack reports whether the
    /// queue already held the job.
    async fn enqueue(&self, item: &WorkItem) -> Result<DispatchAck, DispatchError>;

    /// Check that the queueing substrate is reachable.
    async fn ping(&self) -> Result<(), DispatchError>;
}
