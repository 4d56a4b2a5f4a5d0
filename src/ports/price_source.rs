//! Price Source Port - Upstream Price Board Interface
//!
//! Defines the capability every upstream adapter offers: produce one
//! normalized `PriceRecord` per call. Adapters own no mutable state beyond
//! their HTTP connection pool, so `fetch()` is safe to call repeatedly and
//! concurrently (a forced refresh may overlap a scheduled tick).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::price::{PriceRecord, SourceType};

/// Why a source could not produce a usable record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// Upstream unreachable or timed out.
  #[error("request failed: {0}")]
  Network(String),

  /// Upstream answered with a non-success status.
  #[error("upstream returned HTTP {status}")]
  Http {
    /// HTTP status code.
    status: u16,
  },

  /// Response shape was not what the parser expected.
  #[error("parsing failed: {0}")]
  Parse(String),

  /// `auto` mode: primary and fallback both failed.
  #[error("all sources failed (primary: {primary}; fallback: {fallback})")]
  AllSourcesFailed {
    /// Primary source error message.
    primary: String,
    /// Fallback source error message.
    fallback: String,
  },
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    match err.status() {
      Some(status) => Self::Http { status: status.as_u16() },
      None if err.is_decode() => Self::Parse(err.to_string()),
      None => Self::Network(err.to_string()),
    }
  }
}

/// Trait for upstream price providers.
///
/// Implementors perform their own network timeout; callers add none.
/// A returned `Ok` record always has `success == true`.
#[async_trait]
pub trait PriceSource: Send + Sync + 'static {
  /// Fetch and normalize the current price board.
  async fn fetch(&self) -> Result<PriceRecord, FetchError>;

  /// Stable provenance label (usually the upstream URL).
  fn name(&self) -> &str;

  /// Adapter family, recorded on every record it produces.
  fn source_type(&self) -> SourceType;
}
