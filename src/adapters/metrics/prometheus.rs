//! Prometheus Metrics Registry - Tracker Observability
//!
//! Registers the tracker's counters and gauges and renders them in the
//! Prometheus text format for `GET /metrics`. Covers fetch outcomes per
//! source, detected changes, the live polling interval, history size and
//! skipped scheduler ticks.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Centralized Prometheus metrics for the tracker.
///
/// All metrics follow the naming convention `gold_tracker_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Fetch attempts by source type and outcome (`ok`, `error`).
    pub fetches: IntCounterVec,
    /// Accepted change events.
    pub price_changes: IntCounter,
    /// Interval the scheduler is currently ticking at (seconds).
    pub poll_interval_seconds: IntGauge,
    /// Entries held in the history buffer.
    pub history_entries: IntGauge,
    /// Scheduler ticks that did not fetch, by reason.
    pub skipped_ticks: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let fetches = IntCounterVec::new(
            Opts::new("gold_tracker_fetches_total", "Fetch attempts by source and outcome"),
            &["source", "outcome"],
        )?;

        let price_changes = IntCounter::new(
            "gold_tracker_price_changes_total",
            "Detected upstream announcements",
        )?;

        let poll_interval_seconds = IntGauge::new(
            "gold_tracker_poll_interval_seconds",
            "Current polling interval in seconds",
        )?;

        let history_entries = IntGauge::new(
            "gold_tracker_history_entries",
            "Entries retained in the history buffer",
        )?;

        let skipped_ticks = IntCounterVec::new(
            Opts::new(
                "gold_tracker_skipped_ticks_total",
                "Scheduler ticks that did not fetch",
            ),
            &["reason"],
        )?;

        // Register all metrics
        registry.register(Box::new(fetches.clone()))?;
        registry.register(Box::new(price_changes.clone()))?;
        registry.register(Box::new(poll_interval_seconds.clone()))?;
        registry.register(Box::new(history_entries.clone()))?;
        registry.register(Box::new(skipped_ticks.clone()))?;

        Ok(Self {
            registry,
            fetches,
            price_changes,
            poll_interval_seconds,
            history_entries,
            skipped_ticks,
        })
    }

    /// Record one fetch outcome for a source type.
    pub fn record_fetch(&self, source: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.fetches.with_label_values(&[source, outcome]).inc();
    }

    /// Record a tick that was skipped for `reason`.
    pub fn record_skip(&self, reason: &str) {
        self.skipped_ticks.with_label_values(&[reason]).inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
