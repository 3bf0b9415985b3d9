//! Mock work queue for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::dispatch::{DispatchAck, DispatchError, WorkItem, WorkQueue};

/// In-memory work queue with controllable failure.
///
/// Records every accepted item and deduplicates on job id like a real
/// backend. Flip [`set_fail`](Self::set_fail) to make `enqueue` and `ping`
/// return errors.
pub struct MockWorkQueue {
    items: Mutex<Vec<WorkItem>>,
    seen_job_ids: Mutex<HashSet<String>>,
    fail: AtomicBool,
}

impl MockWorkQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            seen_job_ids: Mutex::new(HashSet::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Make subsequent enqueue/ping calls fail (or recover).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All items accepted so far (deduplicated submissions excluded).
    pub fn enqueued(&self) -> Vec<WorkItem> {
        self.items.lock().unwrap().clone()
    }

    /// Number of items accepted so far.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

impl Default for MockWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for MockWorkQueue {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    async fn enqueue(&self, item: &WorkItem) -> Result<DispatchAck, DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Unreachable(
                "mock queue unavailable".to_string(),
            ));
        }

        let mut seen = self.seen_job_ids.lock().unwrap();
        let deduplicated = !seen.insert(item.job_id.clone());
        if !deduplicated {
            self.items.lock().unwrap().push(item.clone());
        }

        Ok(DispatchAck {
            job_id: item.job_id.clone(),
            deduplicated,
        })
    }

    async fn ping(&self) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Unreachable(
                "mock queue unavailable".to_string(),
            ));
        }
        Ok(())
    }
}
