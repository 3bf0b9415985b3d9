pub mod audit;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod metrics;
pub mod pipeline;
pub mod query;
pub mod testing;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    DispatchConfig, HttpQueueConfig, QueueBackend, QueueConfig, SanitizedConfig, ServerConfig,
};
pub use dispatch::{
    DispatchAck, DispatchError, HttpWorkQueue, OutboxRelay, PendingDispatch, SqliteWorkQueue,
    WorkItem, WorkQueue,
};
pub use document::{
    Article, Chunk, ChunkStatus, CreateArticleRequest, DocumentStore, Episode,
    SqliteDocumentStore, StoreError, Summary,
};
pub use pipeline::{
    aggregate, OverallStatus, Stage, StageEntry, StageMap, StageState, StatusTracker, TrackerError,
};
pub use query::{EpisodeReport, QueryError, QueryService, StageReport, StatusReport};
