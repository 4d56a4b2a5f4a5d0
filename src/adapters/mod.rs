//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, file I/O) and exposes the tracker
//! over HTTP. Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `sources`: upstream price boards (JSON API, HTML scraper)
//! - `persistence`: JSON history snapshot file
//! - `http`: axum request layer
//! - `metrics`: Prometheus registry

pub mod http;
pub mod metrics;
pub mod persistence;
pub mod sources;
