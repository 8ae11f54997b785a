//! Shared application state

use crate::metrics::Metrics;
use history_core::config::Config;
use history_core::db::DbPool;
use history_core::resource::LinkBuilder;
use history_core::{CoreQ, HistoryQ};
use std::sync::Arc;
use tokio::sync::watch;

/// Everything a request handler or stream session needs
///
/// Cloning is cheap: the pool, config and metrics are shared handles.
#[derive(Clone)]
pub struct AppState {
    /// History tables
    pub history: HistoryQ,
    /// Core tables
    pub core: CoreQ,
    /// Service configuration
    pub config: Arc<Config>,
    /// Link builder rooted at `history.base_url`
    pub links: LinkBuilder,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Latest ingested ledger, updated by the ledger watcher
    pub ledger_closed: watch::Receiver<i32>,
}

impl AppState {
    /// State over `pool`; `ledger_closed` comes from [`crate::watcher::spawn`]
    pub fn new(
        pool: DbPool,
        config: Config,
        metrics: Metrics,
        ledger_closed: watch::Receiver<i32>,
    ) -> Self {
        Self {
            history: HistoryQ::new(pool.clone()),
            core: CoreQ::new(pool),
            links: LinkBuilder::new(config.history.base_url.clone()),
            config: Arc::new(config),
            metrics,
            ledger_closed,
        }
    }
}
