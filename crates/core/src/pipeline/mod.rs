//! Pipeline stages, status aggregation and the status tracker.

mod tracker;
mod types;

pub use tracker::{StatusTracker, TrackerError};
pub use types::{aggregate, OverallStatus, Stage, StageEntry, StageMap, StageState};
