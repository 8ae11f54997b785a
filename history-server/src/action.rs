//! Action pipeline
//!
//! An action runs as an ordered list of fallible stages. The driver stops at
//! the first stage that fails and returns that error; no later stage runs.
//!
//! ```text
//! Pipeline ──setup──▶ Session ──execute──▶ Execute ... ──finish──▶ Done
//!    │                       │
//!    └─ Err (dropped)        └──── first failing stage ──▶ Failed
//! ```
//!
//! Setup stages validate and resolve parameters once; a failed setup hands
//! back only the error. Execute stages load and render records; a one-shot
//! request runs them once, a stream re-runs them on every tick with the
//! parameters fixed at setup.

use crate::params::{Params, NOW_CURSOR};
use crate::state::AppState;
use async_trait::async_trait;
use history_core::config::HistoryConfig;
use history_core::resource::{LinkBuilder, Page, Pageable};
use history_core::{toid, Error, LedgerCache, PageQuery, Result, TotalOrderId};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};

/// Lifecycle of a set-up session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ready to execute (possibly again)
    Execute,
    /// Finished successfully
    Done,
    /// A stage failed; nothing further runs
    Failed,
}

/// Preparation stages, run once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    /// Reject requests while history lags too far behind core
    EnsureHistoryFreshness,
    /// Parse and validate request parameters
    LoadParams,
    /// Reject cursors and ledger filters outside the ingested range
    ValidateCursorWithinHistory,
}

impl SetupStage {
    /// All setup stages, in order
    pub const ALL: [SetupStage; 3] = [
        SetupStage::EnsureHistoryFreshness,
        SetupStage::LoadParams,
        SetupStage::ValidateCursorWithinHistory,
    ];

    /// Stage name for logs
    pub fn name(self) -> &'static str {
        match self {
            SetupStage::EnsureHistoryFreshness => "ensure_history_freshness",
            SetupStage::LoadParams => "load_params",
            SetupStage::ValidateCursorWithinHistory => "validate_cursor_within_history",
        }
    }
}

/// Loading and rendering stages, run per execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteStage {
    /// Query the matching rows
    LoadRecords,
    /// Batch-load the ledgers those rows reference
    LoadLedgers,
    /// Render rows into resources
    LoadPage,
}

impl ExecuteStage {
    /// All execute stages, in order
    pub const ALL: [ExecuteStage; 3] = [
        ExecuteStage::LoadRecords,
        ExecuteStage::LoadLedgers,
        ExecuteStage::LoadPage,
    ];

    /// Stage name for logs
    pub fn name(self) -> &'static str {
        match self {
            ExecuteStage::LoadRecords => "load_records",
            ExecuteStage::LoadLedgers => "load_ledgers",
            ExecuteStage::LoadPage => "load_page",
        }
    }
}

/// A paged collection endpoint
#[async_trait]
pub trait CollectionAction: Send + Sync + 'static {
    /// Row type loaded from the store
    type Row: Send + Sync;
    /// Resource type rendered to clients
    type Resource: Pageable + Serialize + Send + Sync;

    /// Name for logs and metrics
    fn name(&self) -> &'static str;

    /// Parse filters from `params` and return the paging parameters
    fn load_params(&mut self, params: &Params, config: &HistoryConfig) -> Result<PageQuery>;

    /// Whether cursors are total-order ids
    fn orders_by_toid(&self) -> bool {
        true
    }

    /// Ledger named by a ledger filter, if one is set
    fn ledger_filter(&self) -> Option<i32> {
        None
    }

    /// Collection path used for page links
    fn path(&self) -> String;

    /// Filter parameters carried into page links
    fn link_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Load one page of rows
    async fn load_records(&self, state: &AppState, page: &PageQuery) -> Result<Vec<Self::Row>>;

    /// Ledger a row closed in, when rendering needs it
    fn ledger_of(&self, row: &Self::Row) -> Option<i32>;

    /// Render a row; ledgers referenced by `ledger_of` are loaded in `ledgers`
    fn render(
        &self,
        row: &Self::Row,
        ledgers: &LedgerCache,
        links: &LinkBuilder,
    ) -> Result<Self::Resource>;
}

/// An action before setup
pub struct Pipeline<A: CollectionAction> {
    action: A,
    params: Params,
    page: PageQuery,
}

impl<A: CollectionAction> Pipeline<A> {
    /// Pipeline for `action` over request `params`
    pub fn new(action: A, params: Params) -> Self {
        Self {
            action,
            params,
            page: PageQuery::default(),
        }
    }

    /// Run the setup stages and hand back an executable session
    pub async fn setup(mut self, state: &AppState) -> Result<Session<A>> {
        for stage in SetupStage::ALL {
            debug!(action = self.action.name(), stage = stage.name(), "Running stage");
            if let Err(err) = self.run_stage(state, stage).await {
                debug!(
                    action = self.action.name(),
                    stage = stage.name(),
                    error = %err,
                    "Setup failed"
                );
                return Err(err);
            }
        }

        Ok(Session {
            action: self.action,
            page: self.page,
            phase: Phase::Execute,
            records: Vec::new(),
            ledgers: LedgerCache::new(),
            resources: Vec::new(),
        })
    }

    async fn run_stage(&mut self, state: &AppState, stage: SetupStage) -> Result<()> {
        match stage {
            SetupStage::EnsureHistoryFreshness => ensure_history_freshness(state).await,
            SetupStage::LoadParams => {
                let mut page = self.action.load_params(&self.params, &state.config.history)?;
                if self.action.orders_by_toid() && page.cursor == NOW_CURSOR {
                    let latest = state.history.latest_ledger().await?;
                    page.cursor = toid::after_ledger(latest).to_string();
                }
                self.page = page;
                Ok(())
            }
            SetupStage::ValidateCursorWithinHistory => {
                validate_cursor_within_history(state, &self.action, &self.page).await
            }
        }
    }
}

async fn ensure_history_freshness(state: &AppState) -> Result<()> {
    let threshold = state.config.history.stale_threshold;
    if threshold == 0 {
        return Ok(());
    }
    let threshold = i32::try_from(threshold).map_err(|_| {
        Error::Config(format!("stale_threshold {} exceeds the ledger sequence range", threshold))
    })?;

    let history = state.history.latest_ledger().await?;
    let core = state.core.latest_ledger().await?;
    if core.saturating_sub(history) > threshold {
        warn!(history, core, threshold, "History is stale");
        return Err(Error::StaleHistory { history, core });
    }
    Ok(())
}

async fn validate_cursor_within_history<A: CollectionAction>(
    state: &AppState,
    action: &A,
    page: &PageQuery,
) -> Result<()> {
    let latest = state.history.latest_ledger().await?;

    if let Some(requested) = action.ledger_filter() {
        if requested > latest {
            return Err(Error::StaleQuery { requested, latest });
        }
    }

    if !action.orders_by_toid() || page.cursor.is_empty() {
        return Ok(());
    }
    let cursor = page.cursor_i64()?;
    if cursor == 0 || cursor == i64::MAX {
        return Ok(());
    }

    let requested = TotalOrderId::parse(cursor)?.ledger_sequence;
    if requested > latest.saturating_add(1) {
        return Err(Error::StaleQuery { requested, latest });
    }
    let elder = state.history.elder_ledger().await?;
    if elder > 0 && requested < elder {
        return Err(Error::BeforeHistory { requested, elder });
    }
    Ok(())
}

/// A set-up action, executable once or repeatedly
pub struct Session<A: CollectionAction> {
    action: A,
    page: PageQuery,
    phase: Phase,
    records: Vec<A::Row>,
    ledgers: LedgerCache,
    resources: Vec<A::Resource>,
}

impl<A: CollectionAction> Session<A> {
    /// The action
    pub fn action(&self) -> &A {
        &self.action
    }

    /// Paging parameters fixed at setup
    pub fn page(&self) -> &PageQuery {
        &self.page
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the execute stages, rendering rows after the first `skip`
    ///
    /// A session that has finished or failed yields nothing.
    pub async fn execute(&mut self, state: &AppState, skip: usize) -> Result<Vec<A::Resource>> {
        if self.phase != Phase::Execute {
            return Ok(Vec::new());
        }

        for stage in ExecuteStage::ALL {
            debug!(action = self.action.name(), stage = stage.name(), "Running stage");
            if let Err(err) = self.run_stage(state, stage, skip).await {
                self.phase = Phase::Failed;
                self.records.clear();
                self.resources.clear();
                return Err(err);
            }
        }
        Ok(std::mem::take(&mut self.resources))
    }

    /// Mark the session finished
    pub fn finish(&mut self) {
        if self.phase == Phase::Execute {
            self.phase = Phase::Done;
        }
    }

    async fn run_stage(
        &mut self,
        state: &AppState,
        stage: ExecuteStage,
        skip: usize,
    ) -> Result<()> {
        match stage {
            ExecuteStage::LoadRecords => {
                self.records = self.action.load_records(state, &self.page).await?;
                Ok(())
            }
            ExecuteStage::LoadLedgers => {
                for row in self.records.iter().skip(skip) {
                    if let Some(sequence) = self.action.ledger_of(row) {
                        self.ledgers.queue(sequence);
                    }
                }
                self.ledgers.load(&state.history).await
            }
            ExecuteStage::LoadPage => {
                let rows = std::mem::take(&mut self.records);
                self.resources = rows
                    .iter()
                    .skip(skip)
                    .map(|row| self.action.render(row, &self.ledgers, &state.links))
                    .collect::<Result<Vec<_>>>()?;
                Ok(())
            }
        }
    }
}

/// Run an action once and assemble its page
pub async fn page<A: CollectionAction>(
    action: A,
    params: Params,
    state: &AppState,
) -> Result<Page<A::Resource>> {
    let name = action.name();
    let started = Instant::now();

    let result = async {
        let mut session = Pipeline::new(action, params).setup(state).await?;
        let records = session.execute(state, 0).await?;
        session.finish();
        Ok::<_, Error>(Page::new(
            records,
            session.page(),
            &state.links,
            &session.action().path(),
            &session.action().link_params(),
        ))
    }
    .await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };
    state
        .metrics
        .record_action(name, outcome, started.elapsed().as_secs_f64());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use history_core::config::Config;
    use history_core::testing;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::watch;

    #[derive(Debug, Serialize)]
    struct Record {
        token: String,
    }

    impl Pageable for Record {
        fn paging_token(&self) -> &str {
            &self.token
        }
    }

    /// Logs every stage it is asked to run
    #[derive(Default)]
    struct Recording {
        log: Arc<Mutex<Vec<String>>>,
        rows: Vec<i64>,
        ledger: Option<i32>,
        fail_loads: bool,
    }

    impl Recording {
        fn log(&self) -> Arc<Mutex<Vec<String>>> {
            self.log.clone()
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    #[async_trait]
    impl CollectionAction for Recording {
        type Row = i64;
        type Resource = Record;

        fn name(&self) -> &'static str {
            "recording"
        }

        fn load_params(&mut self, params: &Params, config: &HistoryConfig) -> Result<PageQuery> {
            self.record("load_params".to_string());
            params.page(config)
        }

        fn ledger_filter(&self) -> Option<i32> {
            self.ledger
        }

        fn path(&self) -> String {
            "/recording".to_string()
        }

        async fn load_records(&self, _state: &AppState, page: &PageQuery) -> Result<Vec<i64>> {
            self.record(format!("load_records {} {} {}", page.cursor, page.order, page.limit));
            if self.fail_loads {
                return Err(Error::NotFound("rows".to_string()));
            }
            Ok(self.rows.clone())
        }

        fn ledger_of(&self, _row: &i64) -> Option<i32> {
            None
        }

        fn render(
            &self,
            row: &i64,
            _ledgers: &LedgerCache,
            _links: &LinkBuilder,
        ) -> Result<Record> {
            self.record(format!("render {}", row));
            Ok(Record {
                token: row.to_string(),
            })
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        Params::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    /// History and core both at ledgers 2..=3
    async fn state(config: Config) -> AppState {
        let pool = testing::store(9).await.unwrap();
        testing::insert_ledger(&pool, 2, 1_700_000_000).await.unwrap();
        testing::insert_ledger(&pool, 3, 1_700_000_005).await.unwrap();
        let (_tx, rx) = watch::channel(0);
        AppState::new(pool, config, Metrics::new().unwrap(), rx)
    }

    fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_freshness_checked_before_params() {
        let mut config = Config::default();
        config.history.stale_threshold = 3;
        let state = state(config).await;
        testing::insert_core_ledger(state.core.pool(), 10).await.unwrap();

        let action = Recording::default();
        let log = action.log();
        let result = Pipeline::new(action, params(&[("limit", "abc")])).setup(&state).await;

        assert!(matches!(result, Err(Error::StaleHistory { history: 3, core: 10 })));
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_setup_failure_stops_before_execute() {
        let state = state(Config::default()).await;

        let action = Recording::default();
        let log = action.log();
        let result = Pipeline::new(action, params(&[("limit", "abc")])).setup(&state).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(entries(&log), vec!["load_params"]);

        let action = Recording {
            ledger: Some(99),
            ..Recording::default()
        };
        let log = action.log();
        let result = Pipeline::new(action, params(&[])).setup(&state).await;
        assert!(matches!(result, Err(Error::StaleQuery { requested: 99, latest: 3 })));
        assert_eq!(entries(&log), vec!["load_params"]);
    }

    #[tokio::test]
    async fn test_reexecution_reuses_setup_params() {
        let state = state(Config::default()).await;
        let cursor = TotalOrderId::ledger_start(2).to_i64().to_string();

        let action = Recording {
            rows: vec![1, 2, 3],
            ..Recording::default()
        };
        let log = action.log();
        let query = params(&[("cursor", &cursor), ("order", "desc"), ("limit", "3")]);
        let mut session = Pipeline::new(action, query).setup(&state).await.unwrap();

        let first = session.execute(&state, 0).await.unwrap();
        assert_eq!(first.len(), 3);
        let second = session.execute(&state, 2).await.unwrap();
        assert_eq!(second.iter().map(|r| r.token.as_str()).collect::<Vec<_>>(), vec!["3"]);

        let load = format!("load_records {} desc 3", cursor);
        assert_eq!(
            entries(&log),
            vec![
                "load_params".to_string(),
                load.clone(),
                "render 1".to_string(),
                "render 2".to_string(),
                "render 3".to_string(),
                load,
                "render 3".to_string(),
            ]
        );
        assert_eq!(session.phase(), Phase::Execute);

        session.finish();
        assert_eq!(session.phase(), Phase::Done);
        assert!(session.execute(&state, 0).await.unwrap().is_empty());
        assert_eq!(entries(&log).len(), 7);
    }

    #[tokio::test]
    async fn test_failed_execute_halts_session() {
        let state = state(Config::default()).await;

        let action = Recording {
            rows: vec![1],
            fail_loads: true,
            ..Recording::default()
        };
        let log = action.log();
        let mut session = Pipeline::new(action, params(&[])).setup(&state).await.unwrap();

        assert!(matches!(session.execute(&state, 0).await, Err(Error::NotFound(_))));
        assert_eq!(session.phase(), Phase::Failed);
        assert!(session.execute(&state, 0).await.unwrap().is_empty());
        assert_eq!(entries(&log), vec!["load_params", "load_records  asc 10"]);
    }

    #[tokio::test]
    async fn test_cursor_bounds() {
        let state = state(Config::default()).await;

        let top = params(&[("cursor", &i64::MAX.to_string()), ("order", "desc")]);
        assert!(Pipeline::new(Recording::default(), top).setup(&state).await.is_ok());

        let beyond = TotalOrderId::ledger_start(5).to_i64().to_string();
        let result = Pipeline::new(Recording::default(), params(&[("cursor", &beyond)]))
            .setup(&state)
            .await;
        assert!(matches!(result, Err(Error::StaleQuery { requested: 5, latest: 3 })));

        let before = TotalOrderId::ledger_start(1).to_i64().to_string();
        let result = Pipeline::new(Recording::default(), params(&[("cursor", &before)]))
            .setup(&state)
            .await;
        assert!(matches!(result, Err(Error::BeforeHistory { requested: 1, elder: 2 })));
    }

    #[tokio::test]
    async fn test_oversized_threshold_is_config_error() {
        let mut config = Config::default();
        config.history.stale_threshold = u32::MAX;
        let state = state(config).await;

        let result = Pipeline::new(Recording::default(), params(&[])).setup(&state).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
