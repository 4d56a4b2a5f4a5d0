//! Price Tracker - Cache, History and Adaptive Polling Service
//!
//! The single owner of all mutable tracker state: the current snapshot,
//! the bounded change history, the adaptive interval state, the source
//! mode, quiet hours and the read gate. Every read and write goes through
//! one `RwLock`; network I/O always runs outside it and only the
//! interpretation of a result is serialized:
//!
//! 1. change detector pass on `change_count`
//! 2. local derivation of missing `price_change`/`today_change`
//! 3. history append (change events only) and snapshot overwrite
//! 4. adaptive interval recompute and reschedule
//!
//! History is flushed to the repository every `flush_every` change events
//! and once more at shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use super::orchestrator::FetchOrchestrator;
use super::scheduler::{Scheduler, TickPeriod};
use super::settings::{SettingsError, SettingsUpdate, SettingsView};
use crate::adapters::metrics::MetricsRegistry;
use crate::config::AppConfig;
use crate::domain::adaptive::{AdaptiveState, IntervalPolicy};
use crate::domain::detector::{self, Observation};
use crate::domain::history::{HistoryBuffer, HistorySummary, DEFAULT_HISTORY_CAPACITY};
use crate::domain::price::{HistoryEntry, PriceChange, PricePair, PriceRecord};
use crate::domain::quiet_hours::QuietHoursConfig;
use crate::domain::source_mode::SourceMode;
use crate::ports::clock::Clock;
use crate::ports::history_repository::HistoryRepository;

/// Construction-time tracker options.
#[derive(Debug, Clone)]
pub struct TrackerOptions {
  pub base_interval: u64,
  pub min_interval: u64,
  pub max_interval: u64,
  pub adaptive_enabled: bool,
  pub policy: IntervalPolicy,
  pub source_mode: SourceMode,
  pub quiet_hours: QuietHoursConfig,
  pub wp_api_enabled: bool,
  pub history_capacity: usize,
  pub flush_every: u32,
  /// Minimum snapshot age before a forced refresh is honoured.
  pub refresh_cooldown: Duration,
}

impl Default for TrackerOptions {
  fn default() -> Self {
    Self {
      base_interval: 120,
      min_interval: 60,
      max_interval: 600,
      adaptive_enabled: false,
      policy: IntervalPolicy::default(),
      source_mode: SourceMode::default(),
      quiet_hours: QuietHoursConfig::default(),
      wp_api_enabled: true,
      history_capacity: DEFAULT_HISTORY_CAPACITY,
      flush_every: 10,
      refresh_cooldown: Duration::from_secs(30),
    }
  }
}

impl TrackerOptions {
  pub fn from_config(config: &AppConfig) -> Self {
    Self {
      base_interval: config.polling.base_interval_secs,
      min_interval: config.polling.min_interval_secs,
      max_interval: config.polling.max_interval_secs,
      adaptive_enabled: config.polling.adaptive_enabled,
      policy: config.polling.interval_policy(),
      source_mode: config.sources.mode,
      quiet_hours: config.quiet_hours,
      wp_api_enabled: config.server.wp_api_enabled,
      history_capacity: config.persistence.history_capacity,
      flush_every: config.persistence.flush_every,
      refresh_cooldown: Duration::from_secs(config.polling.force_refresh_cooldown_secs),
    }
  }
}

/// All state guarded by the tracker's lock.
#[derive(Debug)]
struct TrackerState {
  current: Option<PriceRecord>,
  history: HistoryBuffer,
  adaptive: AdaptiveState,
  adaptive_enabled: bool,
  source_mode: SourceMode,
  quiet_hours: QuietHoursConfig,
  wp_api_enabled: bool,
  changes_since_flush: u32,
}

/// Result of interpreting one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
  /// New announcement appended to history.
  Changed { change_count: u32 },
  /// Same announcement seen again; snapshot refreshed.
  Repeated { unchanged_count: u32 },
  /// Fetch failed; nothing was mutated.
  Failed { error: String },
}

impl ApplyOutcome {
  pub const fn is_success(&self) -> bool {
    !matches!(self, Self::Failed { .. })
  }
}

/// Result of a scheduled tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
  /// Quiet hours are active; no fetch was made.
  QuietHours,
  Fetched(ApplyOutcome),
}

/// Result of a forced refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
  /// Fetch ran; `snapshot` is the (possibly unchanged) current record.
  Refreshed {
    outcome: ApplyOutcome,
    snapshot: Option<PriceRecord>,
  },
  /// Snapshot is too young; carries it unchanged.
  RateLimited {
    snapshot: Option<PriceRecord>,
    retry_after: Duration,
  },
}

/// Gated current-price read.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentRead {
  Disabled,
  NoData,
  Ready(PriceRecord),
}

/// Single-product projection of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
  pub timestamp: DateTime<FixedOffset>,
  pub update_time: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub gold_bar: Option<PricePair>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub gold_ornament: Option<PricePair>,
  pub price_change: Option<PriceChange>,
  pub today_change: Option<PriceChange>,
  pub change_count: u32,
}

/// Newest-first history page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
  pub total: usize,
  pub limit: usize,
  pub offset: usize,
  pub data: Vec<HistoryEntry>,
}

/// Entries recorded on the current local date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodayHistory {
  pub date: NaiveDate,
  pub total: usize,
  pub data: Vec<HistoryEntry>,
  pub today_change: Option<PriceChange>,
}

/// Snapshot plus statistics over retained history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
  pub current: PriceRecord,
  pub statistics: HistorySummary,
}

/// Liveness read model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthView {
  pub status: &'static str,
  pub has_data: bool,
  pub last_update: Option<DateTime<FixedOffset>>,
  pub history_count: usize,
  pub scheduler_running: bool,
  pub storage_healthy: bool,
}

/// Owned tracker service. Share via `Arc`.
pub struct PriceTracker {
  state: RwLock<TrackerState>,
  orchestrator: FetchOrchestrator,
  repository: Arc<dyn HistoryRepository>,
  clock: Arc<dyn Clock>,
  metrics: Arc<MetricsRegistry>,
  period: TickPeriod,
  /// Serializes snapshot-and-write so flushes land in order.
  flush_lock: Mutex<()>,
  policy: IntervalPolicy,
  min_interval: u64,
  max_interval: u64,
  flush_every: u32,
  refresh_cooldown: Duration,
}

impl PriceTracker {
  pub fn new(
    orchestrator: FetchOrchestrator,
    repository: Arc<dyn HistoryRepository>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
    options: TrackerOptions,
  ) -> Self {
    let state = TrackerState {
      current: None,
      history: HistoryBuffer::new(options.history_capacity),
      adaptive: AdaptiveState::new(options.base_interval),
      adaptive_enabled: options.adaptive_enabled,
      source_mode: options.source_mode,
      quiet_hours: options.quiet_hours,
      wp_api_enabled: options.wp_api_enabled,
      changes_since_flush: 0,
    };
    metrics.poll_interval_seconds.set(saturating_i64(options.base_interval));

    Self {
      state: RwLock::new(state),
      orchestrator,
      repository,
      clock,
      metrics,
      period: TickPeriod::from_secs(options.base_interval),
      flush_lock: Mutex::new(()),
      policy: options.policy,
      min_interval: options.min_interval,
      max_interval: options.max_interval,
      flush_every: options.flush_every.max(1),
      refresh_cooldown: options.refresh_cooldown,
    }
  }

  /// Polling period shared with the scheduler.
  pub fn period(&self) -> TickPeriod {
    self.period.clone()
  }

  // ── Lifecycle ───────────────────────────────────────────

  /// Load persisted history, keeping the newest `capacity` entries.
  ///
  /// A missing or unreadable file is logged and the tracker starts empty.
  #[instrument(skip(self))]
  pub async fn load(&self) -> usize {
    let entries = match self.repository.load().await {
      Ok(entries) => entries,
      Err(e) => {
        warn!(error = %e, "Failed to load history, starting empty");
        return 0;
      }
    };

    let mut state = self.state.write().await;
    let stored = entries.len();
    state.history = HistoryBuffer::from_entries(entries, state.history.capacity());
    let loaded = state.history.len();
    self.metrics.history_entries.set(saturating_i64(loaded));
    info!(stored, loaded, "History restored");
    loaded
  }

  /// Write the full history buffer to the repository.
  #[instrument(skip(self))]
  pub async fn flush(&self) -> Result<()> {
    let _guard = self.flush_lock.lock().await;
    let entries = self.state.read().await.history.to_vec();
    self.repository.save(&entries).await?;
    info!(entries = entries.len(), "History flushed");
    Ok(())
  }

  /// Stop the ticker, then flush history one final time.
  #[instrument(skip_all)]
  pub async fn shutdown(&self, scheduler: &Scheduler) -> Result<()> {
    scheduler.stop().await;
    self.flush().await
  }

  // ── Fetch paths ─────────────────────────────────────────

  /// Scheduled tick: honours quiet hours.
  pub async fn scheduled_fetch(&self) -> TickOutcome {
    let now = self.clock.now();
    let quiet = self.state.read().await.quiet_hours.is_quiet(&now);
    if quiet {
      debug!(time = %now.time(), "Quiet hours active, skipping tick");
      self.metrics.record_skip("quiet_hours");
      return TickOutcome::QuietHours;
    }
    TickOutcome::Fetched(self.fetch_now().await)
  }

  /// Unconditional fetch and apply, ignoring quiet hours.
  pub async fn fetch_now(&self) -> ApplyOutcome {
    let mode = self.state.read().await.source_mode;
    let record = self.orchestrator.fetch(mode).await;
    self.apply(record).await
  }

  /// Rate-limited manual refresh.
  #[instrument(skip(self))]
  pub async fn force_refresh(&self) -> RefreshOutcome {
    let now = self.clock.now();
    {
      let state = self.state.read().await;
      if let Some(current) = &state.current {
        let age = (now - current.timestamp).to_std().unwrap_or_default();
        if age < self.refresh_cooldown {
          info!(age_secs = age.as_secs(), "Forced refresh rate limited");
          return RefreshOutcome::RateLimited {
            snapshot: Some(current.clone()),
            retry_after: self.refresh_cooldown - age,
          };
        }
      }
    }

    let outcome = self.fetch_now().await;
    let snapshot = self.state.read().await.current.clone();
    RefreshOutcome::Refreshed { outcome, snapshot }
  }

  /// Interpret one orchestrator result under the state lock.
  #[instrument(skip_all, fields(source = %record.source_type, change_count = record.change_count))]
  pub async fn apply(&self, mut record: PriceRecord) -> ApplyOutcome {
    if !record.success {
      let error = record.error.unwrap_or_else(|| "unknown error".to_string());
      warn!(error = %error, "Fetch failed, keeping cached state");
      return ApplyOutcome::Failed { error };
    }

    let now = self.clock.now();
    let (outcome, flush_due) = {
      let mut state = self.state.write().await;
      let observation = detector::observe(&mut state.adaptive, record.change_count);
      if !observation.is_change() && record.price_change.is_none() {
        // A repeat reports the move that announced it, not a zero delta.
        let count = record.change_count;
        record.price_change = state
          .history
          .latest()
          .filter(|e| e.change_count == count)
          .map(|e| e.price_change);
      }
      state.history.derive_changes(&mut record);

      let outcome = match observation {
        Observation::Changed { change_count } => {
          state.history.push(record.to_history_entry());
          state.changes_since_flush += 1;
          self.metrics.price_changes.inc();
          self.metrics.history_entries.set(saturating_i64(state.history.len()));
          info!(
            change_count,
            bar_sell = ?record.gold_bar.sell,
            history_len = state.history.len(),
            "Price change detected"
          );
          ApplyOutcome::Changed { change_count }
        }
        Observation::Repeated { unchanged_count } => {
          if detector::is_log_milestone(unchanged_count) {
            info!(unchanged_count, "Price unchanged");
          } else {
            debug!(unchanged_count, "Price unchanged");
          }
          ApplyOutcome::Repeated { unchanged_count }
        }
      };

      state.current = Some(record);

      if state.adaptive_enabled {
        let policy = self.policy;
        if let Some(next) = state.adaptive.recompute(&policy, &now) {
          self.set_period(next);
          info!(
            interval_secs = next,
            unchanged_count = state.adaptive.unchanged_count,
            "Adaptive interval adjusted"
          );
        }
      }

      let flush_due = state.changes_since_flush >= self.flush_every;
      if flush_due {
        state.changes_since_flush = 0;
      }
      (outcome, flush_due)
    };

    if flush_due {
      if let Err(e) = self.flush().await {
        error!(error = %e, "Periodic history flush failed");
      }
    }
    outcome
  }

  // ── Reads ───────────────────────────────────────────────

  pub async fn current(&self) -> Option<PriceRecord> {
    self.state.read().await.current.clone()
  }

  /// Current record behind the WP-API gate.
  pub async fn current_gated(&self) -> CurrentRead {
    let state = self.state.read().await;
    if !state.wp_api_enabled {
      return CurrentRead::Disabled;
    }
    state.current.clone().map_or(CurrentRead::NoData, CurrentRead::Ready)
  }

  pub async fn bar(&self) -> Option<ProductView> {
    self.product_view(|r| (Some(r.gold_bar), None)).await
  }

  pub async fn ornament(&self) -> Option<ProductView> {
    self.product_view(|r| (None, Some(r.gold_ornament))).await
  }

  async fn product_view(
    &self,
    pick: fn(&PriceRecord) -> (Option<PricePair>, Option<PricePair>),
  ) -> Option<ProductView> {
    let state = self.state.read().await;
    let current = state.current.as_ref()?;
    let (gold_bar, gold_ornament) = pick(current);
    Some(ProductView {
      timestamp: current.timestamp,
      update_time: current.update_time.clone(),
      gold_bar,
      gold_ornament,
      price_change: current.price_change,
      today_change: current.today_change,
      change_count: current.change_count,
    })
  }

  /// Newest-first page; `limit` is capped at the history capacity.
  pub async fn history(&self, limit: usize, offset: usize) -> HistoryPage {
    let state = self.state.read().await;
    let limit = limit.min(state.history.capacity());
    HistoryPage {
      total: state.history.len(),
      limit,
      offset,
      data: state.history.page(limit, offset),
    }
  }

  /// Entries recorded on today's local date, newest-first.
  pub async fn today(&self) -> TodayHistory {
    let date = self.clock.now().date_naive();
    let state = self.state.read().await;
    let data = state.history.on_date(date);
    TodayHistory {
      date,
      total: data.len(),
      data,
      today_change: state.current.as_ref().and_then(|c| c.today_change),
    }
  }

  /// `None` until there is both a snapshot and at least one history entry.
  pub async fn summary(&self) -> Option<SummaryView> {
    let state = self.state.read().await;
    let current = state.current.clone()?;
    if state.history.is_empty() {
      return None;
    }
    Some(SummaryView {
      current,
      statistics: state.history.summary(),
    })
  }

  /// `degraded` when the history repository reports itself unusable.
  pub async fn health(&self, scheduler_running: bool) -> HealthView {
    let storage_healthy = self.repository.is_healthy().await;
    let state = self.state.read().await;
    HealthView {
      status: if storage_healthy { "healthy" } else { "degraded" },
      storage_healthy,
      has_data: state.current.is_some(),
      last_update: state.current.as_ref().map(|c| c.timestamp),
      history_count: state.history.len(),
      scheduler_running,
    }
  }

  // ── Settings ────────────────────────────────────────────

  pub async fn settings(&self) -> SettingsView {
    Self::settings_view(&*self.state.read().await)
  }

  /// Apply a batched update in field order; stops at the first invalid
  /// field, leaving earlier fields applied.
  #[instrument(skip(self))]
  pub async fn update_settings(&self, update: SettingsUpdate) -> Result<SettingsView, SettingsError> {
    let mut state = self.state.write().await;

    if let Some(enabled) = update.adaptive_enabled {
      state.adaptive_enabled = enabled;
      if !enabled {
        let base = state.adaptive.base_interval;
        state.adaptive.set_base(base);
        self.set_period(base);
      }
      info!(enabled, "Adaptive mode updated");
    }

    if let Some(value) = update.base_interval {
      if !(self.min_interval..=self.max_interval).contains(&value) {
        warn!(value, "Rejected base interval");
        return Err(SettingsError::IntervalOutOfRange {
          value,
          min: self.min_interval,
          max: self.max_interval,
        });
      }
      state.adaptive.set_base(value);
      self.set_period(value);
      info!(base_interval = value, "Base interval updated");
    }

    if let Some(raw) = update.source_mode {
      let mode = raw.parse::<SourceMode>().map_err(SettingsError::UnknownSourceMode)?;
      state.source_mode = mode;
      info!(mode = %mode, "Source mode updated");
    }

    if let Some(quiet) = update.quiet_hours {
      state.quiet_hours = quiet.merged_into(&state.quiet_hours)?;
      info!(quiet_hours = ?state.quiet_hours, "Quiet hours updated");
    }

    if let Some(enabled) = update.wp_api_enabled {
      state.wp_api_enabled = enabled;
      info!(enabled, "WP API gate updated");
    }

    Ok(Self::settings_view(&state))
  }

  fn settings_view(state: &TrackerState) -> SettingsView {
    SettingsView {
      adaptive_enabled: state.adaptive_enabled,
      base_interval: state.adaptive.base_interval,
      current_interval: state.adaptive.current_interval,
      unchanged_count: state.adaptive.unchanged_count,
      source_mode: state.source_mode,
      quiet_hours: state.quiet_hours,
      wp_api_enabled: state.wp_api_enabled,
    }
  }

  fn set_period(&self, secs: u64) {
    self.period.reschedule(Duration::from_secs(secs));
    self.metrics.poll_interval_seconds.set(saturating_i64(secs));
  }
}

fn saturating_i64<T: TryInto<i64>>(value: T) -> i64 {
  value.try_into().unwrap_or(i64::MAX)
}
