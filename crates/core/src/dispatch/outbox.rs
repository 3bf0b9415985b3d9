//! Outbox relay for durable work dispatch.
//!
//! Stage updates and ingestion write their dispatch intents into the outbox
//! in the same transaction as the document write. This relay drains pending
//! intents in the background and enqueues them against the configured queue
//! backend; an intent stays pending until the queue acknowledges it, so a
//! crash or an unreachable queue never loses the link between "stage
//! completed" and "next stage dispatched".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::DispatchConfig;
use crate::document::DocumentStore;
use crate::metrics;

use super::WorkQueue;

/// Drains the dispatch outbox into the work queue.
pub struct OutboxRelay {
    config: DispatchConfig,
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn WorkQueue>,
    audit: Option<AuditHandle>,

    // Runtime state
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
    shutdown_tx: broadcast::Sender<()>,
}

impl OutboxRelay {
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn DocumentStore>,
        queue: Arc<dyn WorkQueue>,
        audit: Option<AuditHandle>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            queue,
            audit,
            running: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            shutdown_tx,
        }
    }

    /// Whether the relay loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Wake the relay loop early (e.g. right after an ingest).
    pub fn nudge(&self) {
        self.notify.notify_one();
    }

    /// Start the relay loop (spawns a background task).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Outbox relay already running");
            return;
        }

        info!(
            backend = self.queue.backend_name(),
            poll_interval_secs = self.config.poll_interval_secs,
            "Starting outbox relay"
        );

        let config = self.config.clone();
        let store = Arc::clone(&self.store);
        let queue = Arc::clone(&self.queue);
        let audit = self.audit.clone();
        let running = Arc::clone(&self.running);
        let notify = Arc::clone(&self.notify);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let poll_interval = Duration::from_secs(config.poll_interval_secs);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = notify.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }

                if !running.load(Ordering::Relaxed) {
                    break;
                }

                drain_pending(&*store, &*queue, audit.as_ref(), config.batch_size).await;
            }

            info!("Outbox relay stopped");
        });
    }

    /// Stop the relay loop.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Outbox relay not running");
            return;
        }

        info!("Stopping outbox relay");
        let _ = self.shutdown_tx.send(());
    }

    /// Drain the outbox once, returning the number of successfully
    /// dispatched intents. Exposed so tests and operators can force a pass
    /// without waiting for the poll interval.
    pub async fn drain(&self) -> usize {
        drain_pending(
            &*self.store,
            &*self.queue,
            self.audit.as_ref(),
            self.config.batch_size,
        )
        .await
    }
}

async fn drain_pending(
    store: &dyn DocumentStore,
    queue: &dyn WorkQueue,
    audit: Option<&AuditHandle>,
    batch_size: i64,
) -> usize {
    let pending = match store.pending_dispatches(batch_size) {
        Ok(pending) => pending,
        Err(e) => {
            warn!("Failed to read dispatch outbox: {}", e);
            return 0;
        }
    };

    let mut dispatched = 0;
    for entry in pending {
        match queue.enqueue(&entry.item).await {
            Ok(ack) => {
                if let Err(e) = store.mark_dispatched(entry.outbox_id) {
                    // The job is on the queue; the duplicate submission on
                    // the next pass is absorbed by job id dedup.
                    warn!(
                        job_id = %entry.item.job_id,
                        "Dispatched but failed to mark outbox row: {}", e
                    );
                    continue;
                }

                debug!(
                    job_id = %entry.item.job_id,
                    queue = %entry.item.queue,
                    deduplicated = ack.deduplicated,
                    "Dispatched work item"
                );
                metrics::DISPATCH_ATTEMPTS
                    .with_label_values(&[if ack.deduplicated {
                        "deduplicated"
                    } else {
                        "dispatched"
                    }])
                    .inc();
                if let Some(audit) = audit {
                    audit.try_emit(AuditEvent::WorkDispatched {
                        article_id: entry.item.article_id.clone(),
                        job_id: entry.item.job_id.clone(),
                        queue: entry.item.queue.clone(),
                        deduplicated: ack.deduplicated,
                    });
                }
                dispatched += 1;
            }
            Err(e) => {
                warn!(
                    job_id = %entry.item.job_id,
                    queue = %entry.item.queue,
                    attempt = entry.attempts + 1,
                    "Failed to enqueue work item: {}", e
                );
                metrics::DISPATCH_ATTEMPTS.with_label_values(&["failed"]).inc();
                if let Err(e) = store.record_dispatch_failure(entry.outbox_id, &e.to_string()) {
                    warn!("Failed to record dispatch failure: {}", e);
                }
                if let Some(audit) = audit {
                    audit.try_emit(AuditEvent::DispatchFailed {
                        article_id: entry.item.article_id.clone(),
                        job_id: entry.item.job_id.clone(),
                        queue: entry.item.queue.clone(),
                        error: e.to_string(),
                        attempt: entry.attempts + 1,
                    });
                }
            }
        }
    }

    if let Ok(backlog) = store.count_pending_dispatches() {
        metrics::OUTBOX_PENDING.set(backlog);
    }

    dispatched
}
