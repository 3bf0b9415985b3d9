//! Status and episode query service.

mod service;

pub use service::{
    EpisodeReport, QueryError, QueryService, StageReport, StatusReport,
    EPISODE_DISPLAY_PUBLISHED, EPISODE_DISPLAY_SCRIPT_READY,
};
