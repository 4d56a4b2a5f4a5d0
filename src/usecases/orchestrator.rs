//! Fetch Orchestrator - Primary/Fallback Source Selection
//!
//! Chooses which source adapter(s) to invoke for a given `SourceMode`:
//! - `api`: primary JSON API only
//! - `scraper`: HTML scraper only
//! - `auto`: primary first; fallback when the primary fails outright or
//!   publishes data older than the staleness threshold
//!
//! Always yields exactly one `PriceRecord`. Adapter errors become failed
//! records (`success = false`), never propagated faults. No extra timeout
//! is layered over the adapters' own.

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::price::PriceRecord;
use crate::domain::source_mode::{ChangeMerge, SourceMode};
use crate::domain::staleness::is_stale;
use crate::ports::clock::Clock;
use crate::ports::price_source::{FetchError, PriceSource};

/// Default publication age after which the primary is considered stale.
pub const DEFAULT_STALE_AFTER_MINUTES: i64 = 30;

/// Primary/fallback decision tree over two source adapters.
pub struct FetchOrchestrator {
  /// Primary adapter (`source_type = api`).
  api: Arc<dyn PriceSource>,
  /// Fallback adapter (`source_type = scraper`).
  scraper: Arc<dyn PriceSource>,
  /// Primary publication age that triggers the fallback.
  stale_after: Duration,
  /// How change fields move from a stale primary into the fallback.
  merge: ChangeMerge,
  clock: Arc<dyn Clock>,
  metrics: Arc<MetricsRegistry>,
}

impl FetchOrchestrator {
  /// Create an orchestrator with the default 30-minute staleness threshold.
  pub fn new(
    api: Arc<dyn PriceSource>,
    scraper: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
  ) -> Self {
    Self {
      api,
      scraper,
      stale_after: Duration::minutes(DEFAULT_STALE_AFTER_MINUTES),
      merge: ChangeMerge::default(),
      clock,
      metrics,
    }
  }

  pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
    self.stale_after = stale_after;
    self
  }

  pub fn with_change_merge(mut self, merge: ChangeMerge) -> Self {
    self.merge = merge;
    self
  }

  /// Fetch one record according to `mode`.
  #[instrument(skip(self), fields(mode = %mode))]
  pub async fn fetch(&self, mode: SourceMode) -> PriceRecord {
    match mode {
      SourceMode::Api => self.single(self.api.as_ref()).await,
      SourceMode::Scraper => self.single(self.scraper.as_ref()).await,
      SourceMode::Auto => self.auto().await,
    }
  }

  async fn single(&self, source: &dyn PriceSource) -> PriceRecord {
    match self.attempt(source).await {
      Ok(record) => record,
      Err(e) => {
        warn!(source = source.name(), error = %e, "Fetch failed");
        self.failed(source, &e)
      }
    }
  }

  async fn auto(&self) -> PriceRecord {
    let primary = match self.attempt(self.api.as_ref()).await {
      Ok(record) => record,
      Err(primary_err) => {
        warn!(error = %primary_err, "Primary source failed, trying fallback");
        return match self.attempt(self.scraper.as_ref()).await {
          Ok(record) => record,
          Err(fallback_err) => {
            let err = FetchError::AllSourcesFailed {
              primary: primary_err.to_string(),
              fallback: fallback_err.to_string(),
            };
            error!(error = %err, "All sources failed, keeping cached snapshot");
            self.failed(self.api.as_ref(), &err)
          }
        };
      }
    };

    let now = self.clock.now();
    if !is_stale(primary.update_time.as_deref(), &now, self.stale_after) {
      return primary;
    }

    warn!(
      update_time = primary.update_time.as_deref().unwrap_or_default(),
      stale_after_minutes = self.stale_after.num_minutes(),
      "Primary data is stale, trying fallback"
    );

    match self.attempt(self.scraper.as_ref()).await {
      Ok(mut fallback) => {
        self.merge.apply(&mut fallback, &primary);
        info!(merge = ?self.merge, "Using fallback over stale primary");
        fallback
      }
      Err(e) => {
        warn!(error = %e, "Fallback failed, serving stale primary");
        primary
      }
    }
  }

  /// One adapter call. Success must be a successful record stamped with
  /// the adapter's own `source_type`.
  async fn attempt(&self, source: &dyn PriceSource) -> Result<PriceRecord, FetchError> {
    let result = source.fetch().await.and_then(|mut record| {
      if !record.success {
        return Err(FetchError::Parse(
          record.error.take().unwrap_or_else(|| "source reported failure".to_string()),
        ));
      }
      record.source_type = source.source_type();
      Ok(record)
    });
    self.metrics.record_fetch(source.source_type().as_str(), result.is_ok());
    result
  }

  fn failed(&self, source: &dyn PriceSource, err: &FetchError) -> PriceRecord {
    PriceRecord::failed(source.name(), source.source_type(), self.clock.now(), err.to_string())
  }
}
