//! Metrics Adapter
//!
//! Prometheus registry for the tracker, rendered by the request layer at
//! `GET /metrics`.

pub mod prometheus;

pub use prometheus::MetricsRegistry;
