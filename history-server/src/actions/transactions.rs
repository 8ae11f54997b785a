use crate::action::CollectionAction;
use crate::params::Params;
use crate::state::AppState;
use async_trait::async_trait;
use history_core::config::HistoryConfig;
use history_core::resource::{LinkBuilder, TransactionResource};
use history_core::{LedgerCache, PageQuery, Result, Transaction, TransactionsQuery};
use std::time::Instant;

/// `GET /transactions` and its account and ledger scoped variants
#[derive(Debug, Clone, Default)]
pub struct TransactionsAction {
    query: TransactionsQuery,
    account: Option<String>,
    ledger: Option<i32>,
    transaction: Option<String>,
    include_failed: bool,
}

#[async_trait]
impl CollectionAction for TransactionsAction {
    type Row = Transaction;
    type Resource = TransactionResource;

    fn name(&self) -> &'static str {
        "transactions_index"
    }

    fn load_params(&mut self, params: &Params, config: &HistoryConfig) -> Result<PageQuery> {
        self.account = params.account_id("account_id")?;
        self.ledger = params.ledger_id("ledger_id")?;
        self.transaction = params.tx_hash("tx_id")?;
        self.include_failed = params.include_failed(config)?;
        let page = params.page(config)?;

        let mut query = TransactionsQuery::new();
        if let Some(account) = &self.account {
            query = query.for_account(account.clone());
        }
        if let Some(ledger) = self.ledger {
            query = query.for_ledger(ledger);
        }
        if let Some(hash) = &self.transaction {
            query = query.for_transaction(hash.clone());
        }
        if self.include_failed {
            query = query.include_failed();
        }
        self.query = query;
        Ok(page)
    }

    fn ledger_filter(&self) -> Option<i32> {
        self.query.identity().effective_ledger()
    }

    fn path(&self) -> String {
        match (&self.account, self.ledger) {
            (Some(account), _) => format!("/accounts/{}/transactions", account),
            (None, Some(ledger)) => format!("/ledgers/{}/transactions", ledger),
            (None, None) => "/transactions".to_string(),
        }
    }

    fn link_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let (None, None, Some(hash)) = (&self.account, self.ledger, &self.transaction) {
            params.push(("tx_id".to_string(), hash.clone()));
        }
        if self.include_failed {
            params.push(("include_failed".to_string(), "true".to_string()));
        }
        params
    }

    async fn load_records(&self, state: &AppState, page: &PageQuery) -> Result<Vec<Transaction>> {
        state.history.transactions(&self.query, page).await
    }

    fn ledger_of(&self, row: &Transaction) -> Option<i32> {
        Some(row.ledger_sequence)
    }

    fn render(
        &self,
        row: &Transaction,
        ledgers: &LedgerCache,
        links: &LinkBuilder,
    ) -> Result<TransactionResource> {
        let ledger = ledgers.get(row.ledger_sequence)?;
        Ok(TransactionResource::new(row, ledger, links))
    }
}

/// `GET /transactions/{tx_id}`
pub async fn show_transaction(state: &AppState, params: &Params) -> Result<TransactionResource> {
    let started = Instant::now();

    let result = async {
        let hash = params
            .tx_hash("tx_id")?
            .ok_or_else(|| history_core::Error::invalid_field("tx_id", "is required"))?;
        let row = state.history.transaction_by_hash(&hash).await?;

        let mut ledgers = LedgerCache::new();
        ledgers.queue(row.ledger_sequence);
        ledgers.load(&state.history).await?;

        let ledger = ledgers.get(row.ledger_sequence)?;
        Ok::<_, history_core::Error>(TransactionResource::new(&row, ledger, &state.links))
    }
    .await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };
    state
        .metrics
        .record_action("transactions_show", outcome, started.elapsed().as_secs_f64());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn params(pairs: &[(&str, &str)]) -> Params {
        Params::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_tx_id_filters_collection() {
        let config = HistoryConfig::default();
        let hash = "ab".repeat(32);

        let mut action = TransactionsAction::default();
        action.load_params(&params(&[("tx_id", &hash)]), &config).unwrap();
        assert_eq!(action.query, TransactionsQuery::new().for_transaction(hash.clone()));
        assert_eq!(action.path(), "/transactions");
        assert_eq!(action.link_params(), vec![("tx_id".to_string(), hash)]);
    }

    #[test]
    fn test_ledger_filter_only_when_effective() {
        let config = HistoryConfig::default();
        let account = stellar_strkey::ed25519::PublicKey([1; 32]).to_string();

        let mut action = TransactionsAction::default();
        action
            .load_params(&params(&[("account_id", &account), ("ledger_id", "99")]), &config)
            .unwrap();
        assert_eq!(action.ledger_filter(), None);

        let mut action = TransactionsAction::default();
        action.load_params(&params(&[("ledger_id", "99")]), &config).unwrap();
        assert_eq!(action.ledger_filter(), Some(99));
    }
}
