//! Batched ledger lookups for one request or stream session
//!
//! Callers queue every ledger sequence a page of records references, then a
//! single [`LedgerCache::load`] fetches the unique, not-yet-loaded sequences
//! in one round trip. The cache is owned by one task and needs no locking.

use crate::db::HistoryQ;
use crate::error::{Error, Result};
use crate::types::Ledger;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Anything that can fetch ledgers in bulk
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Fetch the ledgers for `sequences`; missing ones are simply absent
    async fn ledgers_by_sequence(&self, sequences: &[i32]) -> Result<Vec<Ledger>>;
}

#[async_trait]
impl LedgerSource for HistoryQ {
    async fn ledgers_by_sequence(&self, sequences: &[i32]) -> Result<Vec<Ledger>> {
        HistoryQ::ledgers_by_sequence(self, sequences).await
    }
}

/// Sequence → ledger map filled by one batched load
#[derive(Debug, Default)]
pub struct LedgerCache {
    queued: BTreeSet<i32>,
    records: HashMap<i32, Ledger>,
}

impl LedgerCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `sequence` for the next load
    pub fn queue(&mut self, sequence: i32) {
        if !self.records.contains_key(&sequence) {
            self.queued.insert(sequence);
        }
    }

    /// Fetch every queued sequence in one round trip
    ///
    /// Loading with nothing queued performs no query, so repeated loads are
    /// idempotent.
    pub async fn load<S: LedgerSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        if self.queued.is_empty() {
            return Ok(());
        }

        let sequences: Vec<i32> = std::mem::take(&mut self.queued).into_iter().collect();
        let ledgers = source.ledgers_by_sequence(&sequences).await?;
        debug!(
            requested = sequences.len(),
            found = ledgers.len(),
            "Loaded ledgers"
        );

        for ledger in ledgers {
            self.records.insert(ledger.sequence, ledger);
        }
        Ok(())
    }

    /// Ledger for `sequence`; absence after a load means ingestion is inconsistent
    pub fn get(&self, sequence: i32) -> Result<&Ledger> {
        self.records
            .get(&sequence)
            .ok_or(Error::MissingLedgerData(sequence))
    }

    /// Number of loaded ledgers
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        requested: Mutex<Vec<Vec<i32>>>,
    }

    #[async_trait]
    impl LedgerSource for CountingSource {
        async fn ledgers_by_sequence(&self, sequences: &[i32]) -> Result<Vec<Ledger>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(sequences.to_vec());
            Ok(sequences
                .iter()
                .filter(|seq| **seq != 99)
                .map(|seq| Ledger {
                    sequence: *seq,
                    hash: format!("{:064x}", seq),
                    closed_at: DateTime::from_timestamp(1_500_000_000 + *seq as i64, 0).unwrap(),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_duplicates_collapse_into_one_round_trip() {
        let source = CountingSource::default();
        let mut cache = LedgerCache::new();
        for seq in [3, 1, 3, 2, 1, 3] {
            cache.queue(seq);
        }

        cache.load(&source).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.requested.lock().unwrap()[0], vec![1, 2, 3]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(2).unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let source = CountingSource::default();
        let mut cache = LedgerCache::new();
        cache.queue(5);
        cache.load(&source).await.unwrap();
        cache.load(&source).await.unwrap();

        cache.queue(5);
        cache.load(&source).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_ledger_is_hard_error() {
        let source = CountingSource::default();
        let mut cache = LedgerCache::new();
        cache.queue(99);
        cache.load(&source).await.unwrap();

        assert!(matches!(cache.get(99), Err(Error::MissingLedgerData(99))));
        assert!(matches!(cache.get(1), Err(Error::MissingLedgerData(1))));
    }
}
