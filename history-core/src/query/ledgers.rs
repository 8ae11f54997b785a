use crate::db::HistoryQ;
use crate::error::{Error, Result};
use crate::types::{Ledger, LedgerRow};
use sqlx::{QueryBuilder, Sqlite};

impl HistoryQ {
    /// Latest ingested ledger; 0 when history is empty
    pub async fn latest_ledger(&self) -> Result<i32> {
        let latest: Option<i32> = sqlx::query_scalar("SELECT MAX(sequence) FROM history_ledgers")
            .fetch_one(&self.pool)
            .await?;
        Ok(latest.unwrap_or(0))
    }

    /// Oldest ingested ledger; 0 when history is empty
    pub async fn elder_ledger(&self) -> Result<i32> {
        let elder: Option<i32> = sqlx::query_scalar("SELECT MIN(sequence) FROM history_ledgers")
            .fetch_one(&self.pool)
            .await?;
        Ok(elder.unwrap_or(0))
    }

    /// Load a single ledger
    pub async fn ledger_by_sequence(&self, sequence: i32) -> Result<Ledger> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT sequence, ledger_hash, closed_at FROM history_ledgers WHERE sequence = ",
        );
        builder.push_bind(sequence);
        let row = builder
            .build_query_as::<LedgerRow>()
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| Error::NotFound(format!("ledger {}", sequence)))?
            .try_into()
    }

    /// Load every ledger in `sequences` in one round trip
    pub async fn ledgers_by_sequence(&self, sequences: &[i32]) -> Result<Vec<Ledger>> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT sequence, ledger_hash, closed_at FROM history_ledgers WHERE sequence IN (",
        );
        let mut separated = builder.separated(", ");
        for sequence in sequences {
            separated.push_bind(*sequence);
        }
        separated.push_unseparated(")");

        builder
            .build_query_as::<LedgerRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Ledger::try_from)
            .collect()
    }
}
