//! Stored document types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::StageMap;

/// Coarse article status assigned at creation.
pub const ARTICLE_STATUS_INGESTED: &str = "ingested";

/// Default episode production status.
pub const EPISODE_STATUS_IN_PRODUCTION: &str = "in production";

/// Episode status once a script draft exists.
pub const EPISODE_STATUS_SCRIPT_DRAFTED: &str = "script drafted";

/// An ingested article moving through the pipeline.
///
/// Stage workers mutate the document in place (stage map, script, audio URL);
/// readers never do. The `version` field is bumped on every write and checked
/// by conditional updates so concurrent stage writers cannot lose updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Unique identifier (UUID).
    pub id: String,

    /// Article title, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Source URL, if the article was scraped from the web.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Raw article text as ingested.
    pub raw_text: String,

    /// Source label (e.g. the newsletter name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Coarse free-text status; starts as `ingested`.
    pub status: String,

    /// Per-stage pipeline status.
    pub pipeline_status: StageMap,

    /// Final podcast script, written by the assemble stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// URL of the synthesized audio, written by the text-to-speech stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// When the episode was published, written by the publish stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// Monotonic document version for conditional updates.
    pub version: i64,

    /// When the article was created.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Request to ingest a new article.
#[derive(Debug, Clone, Default)]
pub struct CreateArticleRequest {
    pub title: Option<String>,
    pub url: Option<String>,
    pub raw_text: String,
    pub source: Option<String>,
}

/// A podcast episode record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    /// Unique identifier (UUID).
    pub id: String,
    /// Display name of the episode.
    pub episode_name: String,
    /// Sequence number within the show.
    pub episode_num: u32,
    /// Source newsletter label.
    pub newsletter: String,
    /// Final podcast script, once drafted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Production status (`in production` / `script drafted`).
    pub status: String,
    /// When the episode record was created.
    pub created_at: DateTime<Utc>,
}

impl Episode {
    /// Create a new episode record in production.
    pub fn new(
        episode_name: impl Into<String>,
        episode_num: u32,
        newsletter: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            episode_name: episode_name.into(),
            episode_num,
            newsletter: newsletter.into(),
            script: None,
            status: EPISODE_STATUS_IN_PRODUCTION.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Recombination status of an article chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    #[default]
    NotRecombined,
    Recombined,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::NotRecombined => "not_recombined",
            ChunkStatus::Recombined => "recombined",
        }
    }
}

impl std::str::FromStr for ChunkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_recombined" => Ok(ChunkStatus::NotRecombined),
            "recombined" => Ok(ChunkStatus::Recombined),
            other => Err(format!("Unknown chunk status: {}", other)),
        }
    }
}

/// One chunk of an article, produced by the normalize stage for
/// structured compression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier (UUID).
    pub id: String,
    /// The article this chunk belongs to.
    pub article_id: String,
    /// Chunk text.
    pub chunk_text: String,
    /// Summary of this chunk, written by the summarize stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_summary: Option<String>,
    /// Whether this chunk has been folded into the article summary.
    pub status: ChunkStatus,
}

impl Chunk {
    pub fn new(article_id: impl Into<String>, chunk_text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            article_id: article_id.into(),
            chunk_text: chunk_text.into(),
            chunk_summary: None,
            status: ChunkStatus::NotRecombined,
        }
    }
}

/// The combined summary of an article, assembled from its chunk summaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    /// Unique identifier (UUID).
    pub id: String,
    /// The article this summary belongs to.
    pub article_id: String,
    /// Combined summary text.
    pub summary_text: String,
}

impl Summary {
    pub fn new(article_id: impl Into<String>, summary_text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            article_id: article_id.into(),
            summary_text: summary_text.into(),
        }
    }
}
