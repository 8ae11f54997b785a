use super::{excludes_failed, Identity, IdentityFilter, Select, SUCCESSFUL_ONLY};
use crate::db::HistoryQ;
use crate::error::{Error, Result};
use crate::paging::PageQuery;
use crate::toid;
use crate::types::Transaction;
use tracing::debug;

const TRANSACTION_SELECT: &str = "SELECT ht.id AS id, ht.transaction_hash AS transaction_hash, \
    ht.ledger_sequence AS ledger_sequence, ht.application_order AS application_order, \
    ht.account AS account, ht.account_sequence AS account_sequence, ht.fee_paid AS fee_paid, \
    ht.operation_count AS operation_count, ht.tx_envelope AS tx_envelope, \
    ht.tx_result AS tx_result, ht.tx_meta AS tx_meta, ht.tx_fee_meta AS tx_fee_meta, \
    ht.successful AS successful, ht.signatures AS signatures, ht.memo_type AS memo_type, \
    ht.memo AS memo, ht.valid_after AS valid_after, ht.valid_before AS valid_before \
    FROM history_transactions ht";

/// Transaction collection query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionsQuery {
    identity: IdentityFilter,
    include_failed: bool,
}

impl TransactionsQuery {
    /// All transactions, failed ones excluded
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions `address` participated in
    pub fn for_account(self, address: impl Into<String>) -> Self {
        Self {
            identity: self.identity.with_account(address),
            ..self
        }
    }

    /// Transactions applied in ledger `sequence`
    pub fn for_ledger(self, sequence: i32) -> Self {
        Self {
            identity: self.identity.with_ledger(sequence),
            ..self
        }
    }

    /// The transaction with `hash`, whatever its outcome
    pub fn for_transaction(self, hash: impl Into<String>) -> Self {
        Self {
            identity: self.identity.with_transaction(hash),
            ..self
        }
    }

    /// Keep failed transactions
    pub fn include_failed(self) -> Self {
        Self {
            include_failed: true,
            ..self
        }
    }

    /// Account, ledger and transaction filters
    pub fn identity(&self) -> &IdentityFilter {
        &self.identity
    }

    /// Generate the paged SELECT
    pub fn to_select(&self, page: &PageQuery) -> Result<Select<'static>> {
        let mut select = Select::new(TRANSACTION_SELECT);

        match self.identity.effective() {
            Some(Identity::Account(address)) => {
                select.push(
                    " JOIN history_transaction_participants htp ON htp.history_transaction_id = ht.id",
                );
                select
                    .and_where()
                    .push("htp.history_account_id = (SELECT id FROM history_accounts WHERE address = ")
                    .push_bind(address.to_string())
                    .push(")");
            }
            Some(Identity::Ledger(sequence)) => {
                let (start, end) = toid::ledger_range(sequence);
                select.and_where().push("ht.id >= ").push_bind(start);
                select.and_where().push("ht.id < ").push_bind(end);
            }
            Some(Identity::Transaction(hash)) => {
                select
                    .and_where()
                    .push("ht.transaction_hash = ")
                    .push_bind(hash.to_string());
            }
            None => {}
        }

        if excludes_failed(&self.identity, self.include_failed) {
            select.and_where().push(SUCCESSFUL_ONLY);
        }

        page.apply(&mut select, "ht.id")?;
        Ok(select)
    }
}

impl HistoryQ {
    /// Load one page of transactions
    pub async fn transactions(
        &self,
        query: &TransactionsQuery,
        page: &PageQuery,
    ) -> Result<Vec<Transaction>> {
        let mut builder = query.to_select(page)?.into_builder();
        debug!(sql = builder.sql(), "Selecting transactions");

        let rows = builder
            .build_query_as::<Transaction>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Load a single transaction by hash
    pub async fn transaction_by_hash(&self, hash: &str) -> Result<Transaction> {
        let mut select = Select::new(TRANSACTION_SELECT);
        select
            .and_where()
            .push("ht.transaction_hash = ")
            .push_bind(hash.to_string());

        let mut builder = select.into_builder();
        builder
            .build_query_as::<Transaction>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT_PREDICATE: &str =
        "WHERE htp.history_account_id = (SELECT id FROM history_accounts WHERE address = ?) \
         AND (ht.successful = true OR ht.successful IS NULL)";

    #[test]
    fn test_success_predicate_is_bracketed_after_account() {
        let select = TransactionsQuery::new()
            .for_account("GA5WBPYA")
            .to_select(&PageQuery::default())
            .unwrap();
        assert!(select.sql().contains(ACCOUNT_PREDICATE), "{}", select.sql());
    }

    #[test]
    fn test_include_failed_drops_success_predicate() {
        let select = TransactionsQuery::new()
            .for_account("GA5WBPYA")
            .include_failed()
            .to_select(&PageQuery::default())
            .unwrap();
        assert!(!select.sql().contains("successful IS NULL"), "{}", select.sql());
    }

    #[test]
    fn test_include_failed_is_idempotent() {
        let once = TransactionsQuery::new().for_ledger(3).include_failed();
        let twice = once.clone().include_failed();
        assert_eq!(once, twice);

        let page = PageQuery::default();
        assert_eq!(
            once.to_select(&page).unwrap().sql(),
            twice.to_select(&page).unwrap().sql()
        );
    }

    #[test]
    fn test_repeated_identity_filter_does_not_duplicate() {
        let page = PageQuery::default();
        let sql = TransactionsQuery::new()
            .for_account("GA")
            .for_account("GA")
            .to_select(&page)
            .unwrap()
            .sql()
            .to_string();
        assert_eq!(sql.matches("JOIN history_transaction_participants").count(), 1);
        assert_eq!(sql.matches("ht.successful IS NULL").count(), 1);
    }

    #[test]
    fn test_transaction_filter_returns_both_outcomes() {
        let sql = TransactionsQuery::new()
            .for_transaction("aa".repeat(32))
            .to_select(&PageQuery::default())
            .unwrap()
            .sql()
            .to_string();
        assert!(sql.contains("ht.transaction_hash = ?"));
        assert!(!sql.contains("successful ="));
    }

    #[test]
    fn test_ledger_filter_uses_id_range() {
        let sql = TransactionsQuery::new()
            .for_ledger(12)
            .to_select(&PageQuery::default())
            .unwrap()
            .sql()
            .to_string();
        assert!(sql.contains("WHERE ht.id >= ? AND ht.id < ? AND (ht.successful"));
        assert!(sql.ends_with("ht.id > ? ORDER BY ht.id ASC LIMIT ?"));
    }
}
