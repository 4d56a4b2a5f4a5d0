//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    mode = %config.sources.mode,
    base_interval = config.polling.base_interval_secs,
    adaptive = config.polling.adaptive_enabled,
    history_file = %config.persistence.history_file,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Interval bounds that contain the base interval
/// - A sensible trading window and positive multipliers
/// - Non-empty upstream URLs and positive timeouts
/// - Non-zero retention and flush cadence
fn validate_config(config: &AppConfig) -> Result<()> {
  let polling = &config.polling;

  // Interval validation
  anyhow::ensure!(
    polling.min_interval_secs > 0 && polling.min_interval_secs <= polling.max_interval_secs,
    "min_interval_secs must be in (0, max_interval_secs], got {} (max {})",
    polling.min_interval_secs,
    polling.max_interval_secs
  );
  anyhow::ensure!(
    (polling.min_interval_secs..=polling.max_interval_secs).contains(&polling.base_interval_secs),
    "base_interval_secs must be in [{}, {}], got {}",
    polling.min_interval_secs,
    polling.max_interval_secs,
    polling.base_interval_secs
  );
  anyhow::ensure!(
    polling.trading_start_hour < polling.trading_end_hour && polling.trading_end_hour <= 24,
    "Trading window must satisfy start < end <= 24, got {}..{}",
    polling.trading_start_hour,
    polling.trading_end_hour
  );

  let policy = polling.interval_policy();
  for (name, factor) in [
    ("off_hours_factor", policy.off_hours_factor),
    ("long_idle_factor", policy.long_idle_factor),
    ("short_idle_factor", policy.short_idle_factor),
  ] {
    anyhow::ensure!(
      factor.is_finite() && factor >= 1.0,
      "{name} must be a finite multiplier >= 1, got {factor}"
    );
  }

  // Clock validation
  anyhow::ensure!(
    config.service.utc_offset_minutes.abs() < 24 * 60,
    "utc_offset_minutes must be within +/- 1439, got {}",
    config.service.utc_offset_minutes
  );

  // Source validation
  anyhow::ensure!(
    !config.sources.api_url.is_empty(),
    "Source api_url must not be empty"
  );
  anyhow::ensure!(
    !config.sources.scraper_endpoint().is_empty(),
    "Source scraper_url must not be empty"
  );
  anyhow::ensure!(
    config.sources.api_timeout_secs > 0 && config.sources.scraper_timeout_secs > 0,
    "Source timeouts must be positive"
  );
  anyhow::ensure!(
    config.sources.stale_after_minutes > 0,
    "stale_after_minutes must be positive, got {}",
    config.sources.stale_after_minutes
  );

  // Persistence validation
  anyhow::ensure!(
    config.persistence.history_capacity > 0,
    "history_capacity must be positive"
  );
  anyhow::ensure!(
    config.persistence.flush_every > 0,
    "flush_every must be positive"
  );
  anyhow::ensure!(
    !config.persistence.history_file.is_empty(),
    "history_file must not be empty"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ScraperKind;
  use crate::domain::adaptive::IntervalPreset;
  use crate::domain::source_mode::{ChangeMerge, SourceMode};

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = parse_config("").unwrap();
    assert_eq!(config.polling.base_interval_secs, 120);
    assert_eq!(config.sources.mode, SourceMode::Auto);
    assert_eq!(config.persistence.history_capacity, 1440);
    assert!(config.server.wp_api_enabled);
    assert!(!config.quiet_hours.weekday.enabled);
    assert_eq!(config.sources.scraper, ScraperKind::Goldtraders);
    assert_eq!(config.sources.scraper_endpoint(), "https://classic.goldtraders.or.th/");
  }

  #[test]
  fn test_quiet_window_with_only_enabled_flag() {
    let config = parse_config("[quiet_hours.weekday]\nenabled = true\n").unwrap();
    assert!(config.quiet_hours.weekday.enabled);
    assert_eq!(config.quiet_hours.weekday.start.format("%H:%M").to_string(), "18:00");
    assert_eq!(config.quiet_hours.weekday.end.format("%H:%M").to_string(), "08:30");
  }

  #[test]
  fn test_full_config_parses() {
    let toml = r#"
      [service]
      name = "gold"
      utc_offset_minutes = 420

      [polling]
      base_interval_secs = 90
      adaptive_enabled = true
      interval_preset = "aggressive"
      short_idle_factor = 2.0

      [sources]
      mode = "scraper"
      scraper = "aurora"
      change_merge = "prefer_primary"

      [quiet_hours.weekday]
      enabled = true
      start = "18:00"
      end = "08:00"

      [persistence]
      history_file = "/tmp/h.json"
      flush_every = 5
    "#;
    let config = parse_config(toml).unwrap();
    assert_eq!(config.polling.interval_preset, IntervalPreset::Aggressive);
    let policy = config.polling.interval_policy();
    assert!((policy.off_hours_factor - 10.0).abs() < f64::EPSILON);
    assert!((policy.short_idle_factor - 2.0).abs() < f64::EPSILON);
    assert_eq!(config.sources.mode, SourceMode::Scraper);
    assert_eq!(config.sources.change_merge, ChangeMerge::PreferPrimary);
    assert_eq!(config.sources.scraper, ScraperKind::Aurora);
    assert_eq!(
      config.sources.scraper_endpoint(),
      "https://www.aurora.co.th/price/gold_pricelist"
    );
    assert!(config.quiet_hours.weekday.enabled);
    assert!(!config.quiet_hours.weekend.enabled);
    assert_eq!(config.persistence.flush_every, 5);
  }

  #[test]
  fn test_base_interval_outside_bounds_rejected() {
    let err = parse_config("[polling]\nbase_interval_secs = 700\n").unwrap_err();
    assert!(err.to_string().contains("base_interval_secs"));
  }

  #[test]
  fn test_unknown_mode_rejected() {
    assert!(parse_config("[sources]\nmode = \"ftp\"\n").is_err());
  }

  #[test]
  fn test_shrinking_multiplier_rejected() {
    assert!(parse_config("[polling]\nlong_idle_factor = 0.5\n").is_err());
  }
}
