//! Filter-composable history queries
//!
//! Query specs are immutable values: every combinator consumes the spec and
//! returns a new one, and SQL is generated from the final value in one pass.
//! Setting the same filter twice therefore cannot duplicate a predicate.

mod ledgers;
mod offers;
mod operations;
mod transactions;

pub use operations::OperationsQuery;
pub use transactions::TransactionsQuery;

use sqlx::{QueryBuilder, Sqlite};
use std::fmt::Display;

/// Default success predicate. Rows ingested before the success flag existed
/// have NULL and count as successful. The brackets keep the OR from binding
/// to neighbouring identity predicates.
pub const SUCCESSFUL_ONLY: &str = "(ht.successful = true OR ht.successful IS NULL)";

/// A SELECT under construction that knows whether it has a WHERE clause yet
pub struct Select<'a> {
    builder: QueryBuilder<'a, Sqlite>,
    has_where: bool,
}

impl<'a> Select<'a> {
    /// Start from a `SELECT ... FROM ...` head
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            builder: QueryBuilder::new(head),
            has_where: false,
        }
    }

    /// Push raw SQL (joins, ORDER BY, ...)
    pub fn push(&mut self, sql: impl Display) -> &mut QueryBuilder<'a, Sqlite> {
        self.builder.push(sql)
    }

    /// Open the next predicate with `WHERE` or `AND`
    pub fn and_where(&mut self) -> &mut QueryBuilder<'a, Sqlite> {
        self.builder.push(if self.has_where { " AND " } else { " WHERE " });
        self.has_where = true;
        &mut self.builder
    }

    /// SQL text so far
    pub fn sql(&self) -> &str {
        self.builder.sql()
    }

    /// Finish, yielding the underlying builder
    pub fn into_builder(self) -> QueryBuilder<'a, Sqlite> {
        self.builder
    }
}

/// The identity filter that actually applies to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity<'a> {
    /// Records an account participated in
    Account(&'a str),
    /// Records in one ledger
    Ledger(i32),
    /// Records of one transaction
    Transaction(&'a str),
}

/// Account / ledger / transaction filters with fixed precedence
///
/// Several may be set, but only one is effective:
/// account, then ledger, then transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFilter {
    account: Option<String>,
    ledger: Option<i32>,
    transaction: Option<String>,
}

impl IdentityFilter {
    fn with_account(self, address: impl Into<String>) -> Self {
        Self {
            account: Some(address.into()),
            ..self
        }
    }

    fn with_ledger(self, sequence: i32) -> Self {
        Self {
            ledger: Some(sequence),
            ..self
        }
    }

    fn with_transaction(self, hash: impl Into<String>) -> Self {
        Self {
            transaction: Some(hash.into()),
            ..self
        }
    }

    /// The filter that wins precedence, if any
    pub fn effective(&self) -> Option<Identity<'_>> {
        if let Some(account) = &self.account {
            return Some(Identity::Account(account));
        }
        if let Some(ledger) = self.ledger {
            return Some(Identity::Ledger(ledger));
        }
        self.transaction.as_deref().map(Identity::Transaction)
    }

    /// The ledger filter, when it is the effective one
    pub fn effective_ledger(&self) -> Option<i32> {
        match self.effective() {
            Some(Identity::Ledger(sequence)) => Some(sequence),
            _ => None,
        }
    }
}

/// Whether failed rows must be filtered out
///
/// A transaction-hash filter returns both outcomes: the caller already knows
/// which transaction it asked for.
pub(crate) fn excludes_failed(identity: &IdentityFilter, include_failed: bool) -> bool {
    !include_failed && !matches!(identity.effective(), Some(Identity::Transaction(_)))
}
