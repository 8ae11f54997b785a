//! Streaming responses
//!
//! A stream session re-executes its action on every wakeup, skips the prefix
//! it already sent by count, and writes the rest as events until it reaches
//! its limit, hits an error, or the client goes away. Skipping by count is
//! only correct because the underlying ordering never moves a sent record
//! behind a new one.

use crate::action::{CollectionAction, Pipeline, Session};
use crate::metrics::Metrics;
use crate::params::Params;
use crate::problem::Problem;
use crate::sse;
use crate::state::AppState;
use actix_web::HttpResponse;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use history_core::resource::Pageable;
use history_core::Result;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 64;

/// Per-connection send accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streamer {
    sent: usize,
    limit: usize,
}

impl Streamer {
    /// Stream that closes after `limit` events
    pub fn new(limit: u64) -> Self {
        Self {
            sent: 0,
            limit: usize::try_from(limit).unwrap_or(usize::MAX),
        }
    }

    /// Events sent so far
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Events still allowed
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.sent)
    }

    /// Whether the limit is reached
    pub fn is_done(&self) -> bool {
        self.sent >= self.limit
    }

    /// Cap an unsent suffix to what the limit still allows
    pub fn take<T>(&self, mut unsent: Vec<T>) -> Vec<T> {
        unsent.truncate(self.remaining());
        unsent
    }

    /// Count one sent event
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }
}

/// Something a stream can re-execute
#[async_trait]
pub trait TickSource: Send {
    /// Record type
    type Item: Pageable + Serialize + Send;

    /// Current matching records after the first `skip`
    async fn tick(&mut self, skip: usize) -> Result<Vec<Self::Item>>;
}

/// An action session bound to app state
pub struct ActionSource<A: CollectionAction> {
    session: Session<A>,
    state: AppState,
}

impl<A: CollectionAction> ActionSource<A> {
    /// Source re-executing `session`
    pub fn new(session: Session<A>, state: AppState) -> Self {
        Self { session, state }
    }
}

#[async_trait]
impl<A: CollectionAction> TickSource for ActionSource<A> {
    type Item = A::Resource;

    async fn tick(&mut self, skip: usize) -> Result<Vec<Self::Item>> {
        self.session.execute(&self.state, skip).await
    }
}

/// Wakes a stream on ledger close or after the poll interval
pub struct Wakeup {
    ledger_closed: Option<watch::Receiver<i32>>,
    interval: Interval,
}

impl Wakeup {
    /// Wake on changes of `ledger_closed`, or every `poll` otherwise
    pub fn new(ledger_closed: Option<watch::Receiver<i32>>, poll: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + poll, poll);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ledger_closed,
            interval,
        }
    }

    /// Wait for the next wakeup
    pub async fn wait(&mut self) {
        let alive = {
            let watcher = &mut self.ledger_closed;
            let interval = &mut self.interval;
            tokio::select! {
                alive = async move {
                    match watcher {
                        Some(rx) => rx.changed().await.is_ok(),
                        None => std::future::pending::<bool>().await,
                    }
                } => alive,
                _ = interval.tick() => true,
            }
        };

        // The watcher is gone; keep polling on the interval alone.
        if !alive {
            self.ledger_closed = None;
        }
    }
}

/// Why a stream stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Sent as many events as the limit allows
    LimitReached,
    /// An execution failed; an error event was sent
    Failed,
    /// The client went away
    Disconnected,
}

/// Drive a stream session until it ends
pub async fn drive<S: TickSource>(
    mut source: S,
    mut streamer: Streamer,
    sink: mpsc::Sender<Bytes>,
    mut wakeup: Wakeup,
    metrics: Metrics,
) -> StreamEnd {
    loop {
        let result = tokio::select! {
            _ = sink.closed() => return StreamEnd::Disconnected,
            result = source.tick(streamer.sent()) => result,
        };

        let records = match result {
            Ok(records) => streamer.take(records),
            Err(err) => {
                warn!(error = %err, sent = streamer.sent(), "Stream execution failed");
                let _ = sink.send(sse::error(&Problem::from(&err))).await;
                return StreamEnd::Failed;
            }
        };

        for record in records {
            let event = match sse::data(record.paging_token(), &record) {
                Ok(event) => event,
                Err(err) => {
                    let _ = sink.send(sse::error(&Problem::from(&err))).await;
                    return StreamEnd::Failed;
                }
            };
            if sink.send(event).await.is_err() {
                return StreamEnd::Disconnected;
            }
            streamer.record_sent();
            metrics.stream_events.inc();
        }

        if streamer.is_done() {
            return StreamEnd::LimitReached;
        }

        tokio::select! {
            _ = sink.closed() => return StreamEnd::Disconnected,
            _ = wakeup.wait() => {}
        }
    }
}

/// Set up `action` and answer with an event stream
///
/// Setup failures are returned before the stream opens, so they surface as a
/// regular problem response.
pub async fn start<A: CollectionAction>(
    action: A,
    params: Params,
    state: AppState,
) -> Result<HttpResponse> {
    let name = action.name();
    let session = Pipeline::new(action, params).setup(&state).await?;
    let streamer = Streamer::new(session.page().limit);

    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    // The receiver is alive and the channel empty, so the preamble fits.
    let _ = tx.try_send(sse::retry(state.config.stream.retry_ms));
    let _ = tx.try_send(sse::open());

    let wakeup = Wakeup::new(
        Some(state.ledger_closed.clone()),
        Duration::from_millis(state.config.stream.poll_interval_ms),
    );
    let metrics = state.metrics.clone();

    actix_web::rt::spawn(async move {
        metrics.streams_open.inc();
        debug!(action = name, "Stream opened");
        let source = ActionSource::new(session, state);
        let end = drive(source, streamer, tx, wakeup, metrics.clone()).await;
        metrics.streams_open.dec();
        info!(action = name, reason = ?end, "Stream closed");
    });

    Ok(HttpResponse::Ok()
        .content_type(sse::CONTENT_TYPE)
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(ReceiverStream::new(rx).map(Ok::<_, Infallible>)))
}
