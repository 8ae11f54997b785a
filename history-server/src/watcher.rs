//! Ledger-close watcher
//!
//! One background task polls the latest ingested ledger and publishes it on a
//! `watch` channel. Stream sessions subscribe and re-execute when it moves.

use history_core::HistoryQ;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Start polling `history` every `interval`
///
/// The task stops once every receiver is dropped.
pub fn spawn(history: HistoryQ, interval: Duration) -> (watch::Receiver<i32>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(0);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let current = *tx.borrow();
            match history.latest_ledger().await {
                Ok(latest) if latest != current => {
                    debug!(ledger = latest, "Ledger closed");
                    if tx.send(latest).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "Failed to poll latest ledger"),
            }
        }
    });

    (rx, handle)
}
