//! Shared application state

use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::database::Database;
use crate::core::persona::{PersonaResolver, PgPersonaResolver, StaticPersonaResolver};
use crate::core::session::{MemoryStore, PersistenceStore, PgStore, SessionTracker};
use crate::core::tools::{ToolDispatcher, ToolRegistry};
use crate::core::upstream::{GeminiLiveConfig, GeminiLiveConnector, UpstreamConnector};

/// Application state shared by all handlers
pub struct AppState {
    pub config: ServerConfig,
    /// Opens one live session per client connection
    pub upstream: Arc<dyn UpstreamConnector>,
    pub personas: Arc<dyn PersonaResolver>,
    pub sessions: SessionTracker,
    pub tools: Arc<ToolDispatcher>,
}

impl AppState {
    /// Build the state from configuration.
    ///
    /// With a database URL the persona resolver and the session store share
    /// one lazily connected pool; otherwise the relay runs on the default
    /// persona and the in-memory store.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let upstream: Arc<dyn UpstreamConnector> = Arc::new(GeminiLiveConnector::new(
            GeminiLiveConfig::from(&config.upstream),
        ));

        let (personas, store): (Arc<dyn PersonaResolver>, Arc<dyn PersistenceStore>) =
            if config.has_database() {
                let database = Arc::new(Database::new(config.database.clone()));
                (
                    Arc::new(PgPersonaResolver::new(Arc::clone(&database))),
                    Arc::new(PgStore::new(database)),
                )
            } else {
                info!("No database configured, sessions are kept in memory");
                (Arc::new(StaticPersonaResolver), Arc::new(MemoryStore::new()))
            };

        Self::with_components(config, upstream, personas, store)
    }

    /// Build the state from explicit components.
    pub fn with_components(
        config: ServerConfig,
        upstream: Arc<dyn UpstreamConnector>,
        personas: Arc<dyn PersonaResolver>,
        store: Arc<dyn PersistenceStore>,
    ) -> Arc<Self> {
        let sessions = SessionTracker::new(store, config.database.command_timeout());
        let tools = Arc::new(ToolDispatcher::new(
            Arc::new(ToolRegistry::builtin()),
            config.tools.timeout(),
        ));

        info!(
            upstream = upstream.name(),
            store = sessions.store().name(),
            tools = tools.declarations().len(),
            "Application state initialized"
        );

        Arc::new(Self {
            config,
            upstream,
            personas,
            sessions,
            tools,
        })
    }

    /// Release pooled resources.
    pub async fn shutdown(&self) {
        self.sessions.store().close().await;
    }
}
