use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::{config::ConfigError, errors::ExternalError};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database is not configured")]
    NotConfigured,
    #[error(transparent)]
    Query(#[from] sqlx::Error),
}

impl ExternalError for DatabaseError {
    fn best_effort_message(&self) -> String {
        self.to_string()
    }
}

/// Liveness probe for the backing database.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;
}

#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connections are opened on first use, so an unreachable server only shows up in `ping`.
    pub fn connect_lazy(url: &str) -> Result<Self, ConfigError> {
        Self::connect_lazy_with_timeout(url, ACQUIRE_TIMEOUT)
    }

    pub fn connect_lazy_with_timeout(url: &str, acquire_timeout: Duration) -> Result<Self, ConfigError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)
            .map_err(|err| ConfigError::InvalidDatabaseUrl(err.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseProbe for PgDatabase {
    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredDatabase;

#[async_trait]
impl DatabaseProbe for UnconfiguredDatabase {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Err(DatabaseError::NotConfigured)
    }
}
