//! Shared Postgres connection pool.
//!
//! The pool is process-wide, created on first use and closed on shutdown.
//! A failed initialisation is not cached, so the next caller retries.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::DatabaseSettings;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No database URL configured
    #[error("Persistence store not configured")]
    NotConfigured,

    #[error("Failed to connect: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Injected failure (in-memory store)
    #[error("Store unavailable")]
    Unavailable,
}

pub type StoreResult<T> = Result<T, StoreError>;

pub struct Database {
    settings: DatabaseSettings,
    pool: OnceCell<PgPool>,
}

impl Database {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            pool: OnceCell::new(),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        self.settings.command_timeout()
    }

    /// The pool, connecting on first use.
    pub async fn pool(&self) -> StoreResult<&PgPool> {
        self.pool
            .get_or_try_init(|| async {
                let url = self.settings.url.as_ref().ok_or(StoreError::NotConfigured)?;
                let options = PgConnectOptions::from_str(url.expose())
                    .map_err(|e| StoreError::Connection(e.to_string()))?
                    .application_name(&self.settings.application_name);

                let pool = self
                    .bounded(
                        PgPoolOptions::new()
                            .min_connections(self.settings.min_connections)
                            .max_connections(self.settings.max_connections)
                            .acquire_timeout(self.settings.command_timeout())
                            .connect_with(options),
                    )
                    .await?
                    .map_err(|e| StoreError::Connection(e.to_string()))?;

                info!(
                    max_connections = self.settings.max_connections,
                    "Database pool initialized"
                );
                Ok::<_, StoreError>(pool)
            })
            .await
    }

    /// Bound a database operation by the command timeout.
    pub async fn bounded<T, F>(&self, operation: F) -> StoreResult<T>
    where
        F: Future<Output = T>,
    {
        let limit = self.settings.command_timeout();
        tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| StoreError::Timeout(limit))
    }

    /// Close the pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!("Database pool closed");
        }
    }
}
