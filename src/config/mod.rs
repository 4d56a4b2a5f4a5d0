//! Configuration Module - TOML-based Tracker Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Upstream URLs, polling bounds, interval multipliers and quiet-hours
//! windows are externalized here - nothing is hardcoded in the domain
//! layer. Every section is optional; omitted fields take the defaults
//! below.

pub mod loader;

use serde::Deserialize;

use crate::domain::adaptive::{IntervalPolicy, IntervalPreset};
use crate::domain::quiet_hours::QuietHoursConfig;
use crate::domain::source_mode::{ChangeMerge, SourceMode};

/// Top-level tracker configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the scheduler starts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Service identity and local clock.
  #[serde(default)]
  pub service: ServiceConfig,
  /// Polling cadence and adaptive interval table.
  #[serde(default)]
  pub polling: PollingConfig,
  /// Upstream endpoints and source selection.
  #[serde(default)]
  pub sources: SourcesConfig,
  /// Windows in which scheduled polling is suppressed.
  #[serde(default)]
  pub quiet_hours: QuietHoursConfig,
  /// History file and retention.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// HTTP request layer.
  #[serde(default)]
  pub server: ServerConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Local time offset east of UTC, in minutes (420 = UTC+07:00).
  #[serde(default = "default_utc_offset")]
  pub utc_offset_minutes: i32,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      utc_offset_minutes: default_utc_offset(),
    }
  }
}

/// Polling cadence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
  /// Base polling interval (seconds).
  #[serde(default = "default_base_interval")]
  pub base_interval_secs: u64,
  /// Lowest accepted base interval (seconds).
  #[serde(default = "default_min_interval")]
  pub min_interval_secs: u64,
  /// Highest accepted base interval (seconds).
  #[serde(default = "default_max_interval")]
  pub max_interval_secs: u64,
  /// Scale the interval with trading activity.
  #[serde(default)]
  pub adaptive_enabled: bool,
  /// Multiplier preset for the adaptive table.
  #[serde(default)]
  pub interval_preset: IntervalPreset,
  /// Override the preset's off-hours multiplier.
  pub off_hours_factor: Option<f64>,
  /// Override the preset's ">= 10 repeats" multiplier.
  pub long_idle_factor: Option<f64>,
  /// Override the preset's ">= 5 repeats" multiplier.
  pub short_idle_factor: Option<f64>,
  /// Local hour the trading window opens.
  #[serde(default = "default_trading_start")]
  pub trading_start_hour: u32,
  /// Local hour the trading window closes.
  #[serde(default = "default_trading_end")]
  pub trading_end_hour: u32,
  /// Minimum snapshot age before a forced refresh is honoured (seconds).
  #[serde(default = "default_refresh_cooldown")]
  pub force_refresh_cooldown_secs: u64,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      base_interval_secs: default_base_interval(),
      min_interval_secs: default_min_interval(),
      max_interval_secs: default_max_interval(),
      adaptive_enabled: false,
      interval_preset: IntervalPreset::default(),
      off_hours_factor: None,
      long_idle_factor: None,
      short_idle_factor: None,
      trading_start_hour: default_trading_start(),
      trading_end_hour: default_trading_end(),
      force_refresh_cooldown_secs: default_refresh_cooldown(),
    }
  }
}

impl PollingConfig {
  /// Adaptive table from the preset plus any explicit overrides.
  pub fn interval_policy(&self) -> IntervalPolicy {
    let mut policy = IntervalPolicy::from_preset(self.interval_preset);
    if let Some(f) = self.off_hours_factor {
      policy.off_hours_factor = f;
    }
    if let Some(f) = self.long_idle_factor {
      policy.long_idle_factor = f;
    }
    if let Some(f) = self.short_idle_factor {
      policy.short_idle_factor = f;
    }
    policy.trading_start_hour = self.trading_start_hour;
    policy.trading_end_hour = self.trading_end_hour;
    policy
  }
}

/// Upstream source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
  /// Initial source mode (api, scraper, auto).
  #[serde(default)]
  pub mode: SourceMode,
  /// Primary JSON API endpoint.
  #[serde(default = "default_api_url")]
  pub api_url: String,
  /// API request timeout (seconds).
  #[serde(default = "default_api_timeout")]
  pub api_timeout_secs: u64,
  /// Which HTML price board serves as the fallback.
  #[serde(default)]
  pub scraper: ScraperKind,
  /// Override for the fallback board URL; defaults per `scraper`.
  #[serde(default)]
  pub scraper_url: Option<String>,
  /// Scraper request timeout (seconds).
  #[serde(default = "default_scraper_timeout")]
  pub scraper_timeout_secs: u64,
  /// Primary publication age that triggers the fallback (minutes).
  #[serde(default = "default_stale_after")]
  pub stale_after_minutes: i64,
  /// How change fields are merged when the fallback replaces the primary.
  #[serde(default)]
  pub change_merge: ChangeMerge,
}

impl Default for SourcesConfig {
  fn default() -> Self {
    Self {
      mode: SourceMode::default(),
      api_url: default_api_url(),
      api_timeout_secs: default_api_timeout(),
      scraper: ScraperKind::default(),
      scraper_url: None,
      scraper_timeout_secs: default_scraper_timeout(),
      stale_after_minutes: default_stale_after(),
      change_merge: ChangeMerge::default(),
    }
  }
}

impl SourcesConfig {
  /// Fallback board URL: the explicit override, else the board's own.
  pub fn scraper_endpoint(&self) -> &str {
    self.scraper_url.as_deref().unwrap_or_else(|| self.scraper.default_url())
  }
}

/// HTML boards available as the scraper fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScraperKind {
  /// Gold Traders Association classic board (span ids).
  #[default]
  Goldtraders,
  /// Aurora price list (intraday announcement table).
  Aurora,
}

impl ScraperKind {
  pub const fn default_url(self) -> &'static str {
    match self {
      Self::Goldtraders => "https://classic.goldtraders.or.th/",
      Self::Aurora => "https://www.aurora.co.th/price/gold_pricelist",
    }
  }
}

impl std::fmt::Display for ScraperKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Goldtraders => write!(f, "goldtraders"),
      Self::Aurora => write!(f, "aurora"),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// JSON file holding the full history snapshot.
  #[serde(default = "default_history_file")]
  pub history_file: String,
  /// Maximum retained change events.
  #[serde(default = "default_history_capacity")]
  pub history_capacity: usize,
  /// Flush after this many accepted change events.
  #[serde(default = "default_flush_every")]
  pub flush_every: u32,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      history_file: default_history_file(),
      history_capacity: default_history_capacity(),
      flush_every: default_flush_every(),
    }
  }
}

/// HTTP request layer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Bind address for the API server.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
  /// Serve the current-price read (false = fixed "disabled" response).
  #[serde(default = "default_true")]
  pub wp_api_enabled: bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind_address: default_bind_address(),
      wp_api_enabled: true,
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "gold-price-tracker".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_utc_offset() -> i32 {
  420
}

fn default_true() -> bool {
  true
}

fn default_base_interval() -> u64 {
  120
}

fn default_min_interval() -> u64 {
  60
}

fn default_max_interval() -> u64 {
  600
}

fn default_trading_start() -> u32 {
  9
}

fn default_trading_end() -> u32 {
  17
}

fn default_refresh_cooldown() -> u64 {
  30
}

fn default_api_url() -> String {
  "https://static-gold.tothanate.workers.dev/api/gold".to_string()
}

fn default_api_timeout() -> u64 {
  10
}

fn default_scraper_timeout() -> u64 {
  15
}

fn default_stale_after() -> i64 {
  30
}

fn default_history_file() -> String {
  "data/gold_price_history.json".to_string()
}

fn default_history_capacity() -> usize {
  crate::domain::history::DEFAULT_HISTORY_CAPACITY
}

fn default_flush_every() -> u32 {
  10
}

fn default_bind_address() -> String {
  "0.0.0.0:8000".to_string()
}
