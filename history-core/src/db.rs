//! Read-only store access
//!
//! The history tables (`history_*`) and the core tables (`offers`,
//! `ledgerheaders`, `storestate`) live behind one pooled set of read-only
//! connections. [`HistoryQ`] and [`CoreQ`] are cheap typed handles over it.
//!
//! The backend is SQLite. Generated SQL uses `?` placeholders through
//! `QueryBuilder<Sqlite>` and `true` literals for booleans, so pointing the
//! crate at Postgres means switching [`DbPool`] and the builders' database
//! type to `Postgres`; sqlx then renders `$n` placeholders itself.

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use tracing::info;

/// Shared connection pool
pub type DbPool = Pool<Sqlite>;

/// Open the connection pool and verify it answers
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool> {
    info!("Connecting to history store...");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.url)
        .await?;

    health_check(&pool).await?;
    info!("History store connection verified");

    Ok(pool)
}

/// Round-trip a trivial query
pub async fn health_check(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Queries over the history tables
#[derive(Debug, Clone)]
pub struct HistoryQ {
    pub(crate) pool: DbPool,
}

impl HistoryQ {
    /// Handle over `pool`
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Queries over the core tables
#[derive(Debug, Clone)]
pub struct CoreQ {
    pub(crate) pool: DbPool,
}

impl CoreQ {
    /// Handle over `pool`
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Latest ledger closed by core; 0 when none
    pub async fn latest_ledger(&self) -> Result<i32> {
        let latest: Option<i32> = sqlx::query_scalar("SELECT MAX(ledgerseq) FROM ledgerheaders")
            .fetch_one(&self.pool)
            .await?;
        Ok(latest.unwrap_or(0))
    }
}
