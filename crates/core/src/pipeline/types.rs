//! Pipeline stage and status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One step in the five-step article-to-episode pipeline.
///
/// Stages are fixed and ordered; `next()` encodes the progression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Summarize,
    Assemble,
    TextToSpeech,
    Publish,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::Normalize,
        Stage::Summarize,
        Stage::Assemble,
        Stage::TextToSpeech,
        Stage::Publish,
    ];

    /// The entry stage of the pipeline.
    pub fn first() -> Stage {
        Stage::Normalize
    }

    /// Stage name as it appears in the status map and API responses.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Summarize => "summarize",
            Stage::Assemble => "assemble",
            Stage::TextToSpeech => "text_to_speech",
            Stage::Publish => "publish",
        }
    }

    /// Name of the work queue consumed by this stage's worker pool.
    pub fn queue_name(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Summarize => "summarize_chunks",
            Stage::Assemble => "assemble_summary",
            Stage::TextToSpeech => "text_to_speech",
            Stage::Publish => "publish_episode",
        }
    }

    /// The stage that follows this one, or `None` for the final stage.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Normalize => Some(Stage::Summarize),
            Stage::Summarize => Some(Stage::Assemble),
            Stage::Assemble => Some(Stage::TextToSpeech),
            Stage::TextToSpeech => Some(Stage::Publish),
            Stage::Publish => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normalize" => Ok(Stage::Normalize),
            "summarize" => Ok(Stage::Summarize),
            "assemble" => Ok(Stage::Assemble),
            "text_to_speech" => Ok(Stage::TextToSpeech),
            "publish" => Ok(Stage::Publish),
            other => Err(format!("Unknown stage: {}", other)),
        }
    }
}

/// State of a single pipeline stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Completed => "completed",
            StageState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status map entry for one stage: the state plus when it last changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StageEntry {
    pub status: StageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-article pipeline status map.
///
/// Holds exactly one entry per stage; the all-five-keys invariant is
/// structural. Stages not yet reached stay at their default `pending`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StageMap {
    #[serde(default)]
    pub normalize: StageEntry,
    #[serde(default)]
    pub summarize: StageEntry,
    #[serde(default)]
    pub assemble: StageEntry,
    #[serde(default)]
    pub text_to_speech: StageEntry,
    #[serde(default)]
    pub publish: StageEntry,
}

impl StageMap {
    /// A fresh map with all five stages `pending`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, stage: Stage) -> &StageEntry {
        match stage {
            Stage::Normalize => &self.normalize,
            Stage::Summarize => &self.summarize,
            Stage::Assemble => &self.assemble,
            Stage::TextToSpeech => &self.text_to_speech,
            Stage::Publish => &self.publish,
        }
    }

    /// Set one stage's state and stamp its update time.
    pub fn set(&mut self, stage: Stage, state: StageState, at: DateTime<Utc>) {
        let entry = match stage {
            Stage::Normalize => &mut self.normalize,
            Stage::Summarize => &mut self.summarize,
            Stage::Assemble => &mut self.assemble,
            Stage::TextToSpeech => &mut self.text_to_speech,
            Stage::Publish => &mut self.publish,
        };
        entry.status = state;
        entry.updated_at = Some(at);
    }

    /// Stage states in pipeline order.
    pub fn states(&self) -> [StageState; 5] {
        [
            self.normalize.status,
            self.summarize.status,
            self.assemble.status,
            self.text_to_speech.status,
            self.publish.status,
        ]
    }

    /// The aggregate status over all five stages.
    pub fn overall(&self) -> OverallStatus {
        aggregate(&self.states())
    }
}

/// Aggregate status derived from the per-stage states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Pending => "pending",
            OverallStatus::InProgress => "in_progress",
            OverallStatus::Completed => "completed",
            OverallStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compute the aggregate status from per-stage states.
///
/// Precedence, first match wins:
/// 1. every stage `completed` -> `completed`
/// 2. any stage `failed` -> `failed` (even if earlier stages are pending)
/// 3. any stage `running` or `completed` -> `in_progress`
/// 4. otherwise -> `pending`
///
/// An empty input aggregates to `pending`: rule 1 is vacuously true over an
/// empty slice, so it must not be consulted.
pub fn aggregate(states: &[StageState]) -> OverallStatus {
    if states.is_empty() {
        return OverallStatus::Pending;
    }
    if states.iter().all(|s| *s == StageState::Completed) {
        OverallStatus::Completed
    } else if states.iter().any(|s| *s == StageState::Failed) {
        OverallStatus::Failed
    } else if states
        .iter()
        .any(|s| matches!(s, StageState::Running | StageState::Completed))
    {
        OverallStatus::InProgress
    } else {
        OverallStatus::Pending
    }
}
