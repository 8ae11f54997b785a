use crate::action::CollectionAction;
use crate::params::Params;
use crate::state::AppState;
use async_trait::async_trait;
use history_core::config::HistoryConfig;
use history_core::resource::{LinkBuilder, OperationResource};
use history_core::{LedgerCache, Operation, OperationsQuery, PageQuery, Result};

/// `GET /operations` and `GET /payments`, optionally scoped to an account,
/// a ledger or a transaction
#[derive(Debug, Clone, Default)]
pub struct OperationsAction {
    payments_only: bool,
    query: OperationsQuery,
    account: Option<String>,
    ledger: Option<i32>,
    transaction: Option<String>,
    include_failed: bool,
}

impl OperationsAction {
    /// Every operation type
    pub fn operations() -> Self {
        Self::default()
    }

    /// Payment-like operations only
    pub fn payments() -> Self {
        Self {
            payments_only: true,
            ..Self::default()
        }
    }

    fn collection(&self) -> &'static str {
        if self.payments_only {
            "payments"
        } else {
            "operations"
        }
    }
}

#[async_trait]
impl CollectionAction for OperationsAction {
    type Row = Operation;
    type Resource = OperationResource;

    fn name(&self) -> &'static str {
        if self.payments_only {
            "payments_index"
        } else {
            "operations_index"
        }
    }

    fn load_params(&mut self, params: &Params, config: &HistoryConfig) -> Result<PageQuery> {
        self.account = params.account_id("account_id")?;
        self.ledger = params.ledger_id("ledger_id")?;
        self.transaction = params.tx_hash("tx_id")?;
        self.include_failed = params.include_failed(config)?;
        let page = params.page(config)?;

        let mut query = OperationsQuery::new();
        if self.payments_only {
            query = query.only_payments();
        }
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
        match (&self.account, self.ledger, &self.transaction) {
            (Some(account), _, _) => format!("/accounts/{}/{}", account, self.collection()),
            (None, Some(ledger), _) => format!("/ledgers/{}/{}", ledger, self.collection()),
            (None, None, Some(hash)) => format!("/transactions/{}/{}", hash, self.collection()),
            (None, None, None) => format!("/{}", self.collection()),
        }
    }

    fn link_params(&self) -> Vec<(String, String)> {
        if self.include_failed {
            vec![("include_failed".to_string(), "true".to_string())]
        } else {
            Vec::new()
        }
    }

    async fn load_records(&self, state: &AppState, page: &PageQuery) -> Result<Vec<Operation>> {
        state.history.operations(&self.query, page).await
    }

    fn ledger_of(&self, row: &Operation) -> Option<i32> {
        Some(row.ledger_sequence())
    }

    fn render(
        &self,
        row: &Operation,
        ledgers: &LedgerCache,
        links: &LinkBuilder,
    ) -> Result<OperationResource> {
        let ledger = ledgers.get(row.ledger_sequence())?;
        OperationResource::new(row, ledger, links)
    }
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
    fn test_path_follows_filter_precedence() {
        let config = HistoryConfig::default();
        let account = stellar_strkey::ed25519::PublicKey([1; 32]).to_string();

        let mut action = OperationsAction::payments();
        action
            .load_params(&params(&[("account_id", &account), ("ledger_id", "4")]), &config)
            .unwrap();
        assert_eq!(action.path(), format!("/accounts/{}/payments", account));
        assert_eq!(action.ledger_filter(), None);

        let mut action = OperationsAction::operations();
        action
            .load_params(&params(&[("ledger_id", "4")]), &config)
            .unwrap();
        assert_eq!(action.path(), "/ledgers/4/operations");
        assert_eq!(action.ledger_filter(), Some(4));
        assert_eq!(action.name(), "operations_index");
    }

    #[test]
    fn test_include_failed_carried_into_links() {
        let config = HistoryConfig::default();
        let mut action = OperationsAction::operations();
        action
            .load_params(&params(&[("include_failed", "true")]), &config)
            .unwrap();
        assert_eq!(
            action.link_params(),
            vec![("include_failed".to_string(), "true".to_string())]
        );
    }
}
