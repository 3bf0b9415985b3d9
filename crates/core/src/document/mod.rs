//! Stored documents and their persistence layer.

mod sqlite;
mod store;
mod types;

pub(crate) use store::article_from_request;
pub use sqlite::SqliteDocumentStore;
pub use store::{DocumentStore, StoreError};
pub use types::{
    Article, Chunk, ChunkStatus, CreateArticleRequest, Episode, Summary, ARTICLE_STATUS_INGESTED,
    EPISODE_STATUS_IN_PRODUCTION, EPISODE_STATUS_SCRIPT_DRAFTED,
};
