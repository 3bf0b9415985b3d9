use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use castline_core::{
    create_audit_system, load_config, validate_config, AuditEvent, AuditStore, DocumentStore,
    HttpWorkQueue, OutboxRelay, QueryService, QueueBackend, SqliteAuditStore, SqliteDocumentStore,
    SqliteWorkQueue, StatusTracker, WorkQueue,
};

use castline_server::api::create_router;
use castline_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CASTLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Create SQLite document store
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteDocumentStore::new(&config.database.path)
            .context("Failed to create document store")?,
    );
    info!("Document store initialized");

    // Create SQLite audit store
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);

    // Spawn audit writer task
    let writer_handle = tokio::spawn(audit_writer.run());

    // Emit ServiceStarted event
    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    // Create work queue backend
    let queue: Arc<dyn WorkQueue> = match config.queue.backend {
        QueueBackend::Sqlite => {
            info!("Initializing embedded work queue at {:?}", config.queue.path);
            Arc::new(
                SqliteWorkQueue::new(&config.queue.path)
                    .context("Failed to create work queue")?,
            )
        }
        QueueBackend::Http => {
            // Presence is enforced by validate_config
            let http_config = config
                .queue
                .http
                .clone()
                .context("queue.backend = \"http\" requires a [queue.http] section")?;
            info!("Initializing remote work queue at {}", http_config.url);
            Arc::new(HttpWorkQueue::new(http_config))
        }
    };

    if let Err(e) = queue.ping().await {
        error!("Work queue is not reachable at startup: {}", e);
    }

    // Create status tracker and query service
    let tracker = StatusTracker::new(Arc::clone(&store), config.dispatch.job_timeout_secs)
        .with_audit(audit_handle.clone());
    let query = QueryService::new(Arc::clone(&store));

    // Create and start the outbox relay
    let relay = Arc::new(OutboxRelay::new(
        config.dispatch.clone(),
        Arc::clone(&store),
        Arc::clone(&queue),
        Some(audit_handle.clone()),
    ));
    relay.start().await;
    info!("Outbox relay started");

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        tracker,
        query,
        Arc::clone(&relay),
        audit_handle.clone(),
        audit_store,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the relay
    info!("Server shutting down...");
    relay.stop().await;

    // Emit ServiceStopped event
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // Drop all holders of AuditHandle so the writer's channel closes.
    // The relay holds a clone, as does the tracker inside AppState (already
    // dropped with the router). Order matters: the final event is emitted
    // BEFORE the handles are dropped.
    drop(relay);
    drop(audit_handle);

    // Wait for writer to finish processing remaining events
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
