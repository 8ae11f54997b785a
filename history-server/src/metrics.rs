//! Prometheus metrics for the history service
//!
//! # Metrics
//!
//! - `history_actions_total` - Actions served, by action and outcome
//! - `history_action_duration_seconds` - Histogram of action latencies
//! - `history_stream_events_total` - Data events written to streams
//! - `history_streams_open` - Currently open streams

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Actions served by action and outcome
    pub actions_total: IntCounterVec,

    /// Action latency histogram
    pub action_duration: HistogramVec,

    /// Stream data events sent
    pub stream_events: IntCounter,

    /// Open streams
    pub streams_open: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let actions_total = IntCounterVec::new(
            Opts::new("history_actions_total", "Actions served, by action and outcome"),
            &["action", "outcome"],
        )?;
        registry.register(Box::new(actions_total.clone()))?;

        let action_duration = HistogramVec::new(
            HistogramOpts::new("history_action_duration_seconds", "Histogram of action latencies")
                .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
            &["action"],
        )?;
        registry.register(Box::new(action_duration.clone()))?;

        let stream_events = IntCounter::new(
            "history_stream_events_total",
            "Data events written to streams",
        )?;
        registry.register(Box::new(stream_events.clone()))?;

        let streams_open = IntGauge::new("history_streams_open", "Currently open streams")?;
        registry.register(Box::new(streams_open.clone()))?;

        Ok(Self {
            actions_total,
            action_duration,
            stream_events,
            streams_open,
            registry,
        })
    }

    /// Record one finished action
    pub fn record_action(&self, action: &str, outcome: &str, seconds: f64) {
        self.actions_total.with_label_values(&[action, outcome]).inc();
        self.action_duration
            .with_label_values(&[action])
            .observe(seconds);
    }

    /// Encode the registry in Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.stream_events.get(), 0);
        assert_eq!(metrics.streams_open.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        // Private registries never collide on metric names.
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.stream_events.inc();
        assert_eq!(b.stream_events.get(), 0);
    }

    #[test]
    fn test_render_includes_actions() {
        let metrics = Metrics::new().unwrap();
        metrics.record_action("transactions_index", "ok", 0.002);
        let text = metrics.render().unwrap();
        assert!(text.contains("history_actions_total"));
        assert!(text.contains("transactions_index"));
    }
}
