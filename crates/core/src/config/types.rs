use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            dispatch: DispatchConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("castline.db")
}

/// Dispatch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Advisory timeout for queued stage jobs in seconds (default: 600)
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u32,
    /// Outbox relay poll interval in seconds (default: 5)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum outbox rows drained per pass (default: 50)
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: default_job_timeout(),
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_job_timeout() -> u32 {
    600
}

fn default_poll_interval() -> u64 {
    5
}

fn default_batch_size() -> i64 {
    50
}

/// Work queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Queue backend type
    #[serde(default)]
    pub backend: QueueBackend,
    /// Path of the embedded queue database (used when backend = "sqlite")
    #[serde(default = "default_queue_path")]
    pub path: PathBuf,
    /// Remote queue service configuration (required when backend = "http")
    #[serde(default)]
    pub http: Option<HttpQueueConfig>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            path: default_queue_path(),
            http: None,
        }
    }
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("castline-queue.db")
}

/// Available queue backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    #[default]
    Sqlite,
    Http,
}

/// Remote queue service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpQueueConfig {
    /// Queue service URL (e.g., "http://localhost:7000")
    pub url: String,
    /// API key, if the service requires one
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u32,
}

fn default_http_timeout() -> u32 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    pub queue: SanitizedQueueConfig,
}

/// Sanitized queue config (API key redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQueueConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<SanitizedHttpQueueConfig>,
}

/// Sanitized remote queue config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedHttpQueueConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            dispatch: config.dispatch.clone(),
            queue: SanitizedQueueConfig {
                backend: match config.queue.backend {
                    QueueBackend::Sqlite => "sqlite".to_string(),
                    QueueBackend::Http => "http".to_string(),
                },
                http: config.queue.http.as_ref().map(|h| SanitizedHttpQueueConfig {
                    url: h.url.clone(),
                    api_key_configured: h.api_key.as_ref().is_some_and(|k| !k.is_empty()),
                    timeout_secs: h.timeout_secs,
                }),
            },
        }
    }
}
