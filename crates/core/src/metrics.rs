//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion (articles created)
//! - Pipeline status tracking (stage transitions, version conflicts)
//! - Dispatch (outbox relay enqueue attempts, pending backlog)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Ingestion Metrics
// =============================================================================

/// Articles ingested total.
pub static ARTICLES_INGESTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "castline_articles_ingested_total",
        "Total articles ingested",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Status Metrics
// =============================================================================

/// Stage state transitions by stage and new state.
pub static STAGE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "castline_stage_transitions_total",
            "Stage state transitions recorded",
        ),
        &["stage", "state"],
    )
    .unwrap()
});

/// Conditional update conflicts observed by the status tracker.
pub static VERSION_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "castline_version_conflicts_total",
        "Document version conflicts on stage updates",
    )
    .unwrap()
});

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Enqueue attempts by result.
pub static DISPATCH_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "castline_dispatch_attempts_total",
            "Outbox relay enqueue attempts",
        ),
        &["result"], // "dispatched", "deduplicated", "failed"
    )
    .unwrap()
});

/// Dispatch intents currently waiting in the outbox.
pub static OUTBOX_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "castline_outbox_pending",
        "Dispatch intents waiting in the outbox",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ARTICLES_INGESTED.clone()),
        Box::new(STAGE_TRANSITIONS.clone()),
        Box::new(VERSION_CONFLICTS.clone()),
        Box::new(DISPATCH_ATTEMPTS.clone()),
        Box::new(OUTBOX_PENDING.clone()),
    ]
}
