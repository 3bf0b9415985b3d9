use std::sync::Arc;

use castline_core::{
    AuditHandle, AuditStore, Config, DocumentStore, OutboxRelay, QueryService, SanitizedConfig,
    StatusTracker,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn DocumentStore>,
    tracker: StatusTracker,
    query: QueryService,
    relay: Arc<OutboxRelay>,
    audit: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        tracker: StatusTracker,
        query: QueryService,
        relay: Arc<OutboxRelay>,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            config,
            store,
            tracker,
            query,
            relay,
            audit,
            audit_store,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    pub fn relay(&self) -> &OutboxRelay {
        &self.relay
    }

    #[allow(dead_code)]
    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }
}
