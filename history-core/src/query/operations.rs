use super::{excludes_failed, Identity, IdentityFilter, Select, SUCCESSFUL_ONLY};
use crate::db::HistoryQ;
use crate::error::Result;
use crate::paging::PageQuery;
use crate::toid;
use crate::types::{Operation, OperationType};
use tracing::debug;

const OPERATION_SELECT: &str = "SELECT hop.id AS id, hop.transaction_id AS transaction_id, \
    hop.application_order AS application_order, hop.type AS type, hop.details AS details, \
    hop.source_account AS source_account, ht.transaction_hash AS transaction_hash, \
    ht.successful AS transaction_successful \
    FROM history_operations hop \
    JOIN history_transactions ht ON ht.id = hop.transaction_id";

/// Operation collection query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationsQuery {
    identity: IdentityFilter,
    include_failed: bool,
    only_payments: bool,
}

impl OperationsQuery {
    /// All operations of successful transactions
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations `address` participated in
    pub fn for_account(self, address: impl Into<String>) -> Self {
        Self {
            identity: self.identity.with_account(address),
            ..self
        }
    }

    /// Operations applied in ledger `sequence`
    pub fn for_ledger(self, sequence: i32) -> Self {
        Self {
            identity: self.identity.with_ledger(sequence),
            ..self
        }
    }

    /// Operations of the transaction with `hash`, whatever its outcome
    pub fn for_transaction(self, hash: impl Into<String>) -> Self {
        Self {
            identity: self.identity.with_transaction(hash),
            ..self
        }
    }

    /// Keep operations of failed transactions
    pub fn include_failed(self) -> Self {
        Self {
            include_failed: true,
            ..self
        }
    }

    /// Restrict to value-moving operation types
    pub fn only_payments(self) -> Self {
        Self {
            only_payments: true,
            ..self
        }
    }

    /// Account, ledger and transaction filters
    pub fn identity(&self) -> &IdentityFilter {
        &self.identity
    }

    /// Generate the paged SELECT
    pub fn to_select(&self, page: &PageQuery) -> Result<Select<'static>> {
        let mut select = Select::new(OPERATION_SELECT);

        match self.identity.effective() {
            Some(Identity::Account(address)) => {
                select.push(
                    " JOIN history_operation_participants hopp ON hopp.history_operation_id = hop.id",
                );
                select
                    .and_where()
                    .push("hopp.history_account_id = (SELECT id FROM history_accounts WHERE address = ")
                    .push_bind(address.to_string())
                    .push(")");
            }
            Some(Identity::Ledger(sequence)) => {
                let (start, end) = toid::ledger_range(sequence);
                select.and_where().push("hop.id >= ").push_bind(start);
                select.and_where().push("hop.id < ").push_bind(end);
            }
            Some(Identity::Transaction(hash)) => {
                select
                    .and_where()
                    .push("ht.transaction_hash = ")
                    .push_bind(hash.to_string());
            }
            None => {}
        }

        if self.only_payments {
            let types = OperationType::PAYMENTS
                .iter()
                .map(|ty| (*ty as i32).to_string())
                .collect::<Vec<_>>()
                .join(", ");
            select.and_where().push(format!("hop.type IN ({})", types));
        }

        if excludes_failed(&self.identity, self.include_failed) {
            select.and_where().push(SUCCESSFUL_ONLY);
        }

        page.apply(&mut select, "hop.id")?;
        Ok(select)
    }
}

impl HistoryQ {
    /// Load one page of operations
    pub async fn operations(
        &self,
        query: &OperationsQuery,
        page: &PageQuery,
    ) -> Result<Vec<Operation>> {
        let mut builder = query.to_select(page)?.into_builder();
        debug!(sql = builder.sql(), "Selecting operations");

        let rows = builder
            .build_query_as::<Operation>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payments_filter() {
        let sql = OperationsQuery::new()
            .only_payments()
            .to_select(&PageQuery::default())
            .unwrap()
            .sql()
            .to_string();
        assert!(sql.contains(&format!("WHERE hop.type IN (0, 1, 2, 8) AND {}", SUCCESSFUL_ONLY)));
    }

    #[test]
    fn test_account_join_and_grouping() {
        let sql = OperationsQuery::new()
            .for_account("GB")
            .to_select(&PageQuery::default().invert())
            .unwrap()
            .sql()
            .to_string();
        assert!(sql.contains("JOIN history_operation_participants hopp"));
        assert!(sql.contains(&format!(") AND {} AND hop.id < ?", SUCCESSFUL_ONLY)));
        assert!(sql.ends_with("ORDER BY hop.id DESC LIMIT ?"));
    }

    #[test]
    fn test_payments_twice_is_single_clause() {
        let query = OperationsQuery::new().only_payments().only_payments().include_failed();
        let sql = query.to_select(&PageQuery::default()).unwrap().sql().to_string();
        assert_eq!(sql.matches("hop.type IN").count(), 1);
        assert!(!sql.contains("IS NULL"));
    }
}
