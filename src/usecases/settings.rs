//! Runtime Settings - Batched Updates and Read Model
//!
//! A `SettingsUpdate` is applied field by field in a fixed order:
//! `adaptive_enabled`, `base_interval`, `source_mode`, `quiet_hours`,
//! `wp_api_enabled`. The first invalid field aborts the batch with a
//! [`SettingsError`]; fields before it stay applied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::quiet_hours::{parse_hhmm, QuietHoursConfig, QuietWindow};
use crate::domain::source_mode::SourceMode;

/// Rejected settings field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
  #[error("base_interval must be {min}-{max} seconds, got {value}")]
  IntervalOutOfRange { value: u64, min: u64, max: u64 },

  #[error("unknown source mode '{0}', expected api, scraper or auto")]
  UnknownSourceMode(String),

  #[error("invalid time of day '{0}', expected HH:MM")]
  InvalidTime(String),
}

/// Partial update for one quiet-hours window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuietWindowUpdate {
  pub enabled: Option<bool>,
  pub start: Option<String>,
  pub end: Option<String>,
}

impl QuietWindowUpdate {
  /// Validate every field, then produce the updated window.
  pub fn merged_into(&self, window: &QuietWindow) -> Result<QuietWindow, SettingsError> {
    let parse = |raw: &Option<String>, current| match raw {
      Some(text) => parse_hhmm(text).ok_or_else(|| SettingsError::InvalidTime(text.clone())),
      None => Ok(current),
    };
    Ok(QuietWindow {
      enabled: self.enabled.unwrap_or(window.enabled),
      start: parse(&self.start, window.start)?,
      end: parse(&self.end, window.end)?,
    })
  }
}

/// Partial update for both day types.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuietHoursUpdate {
  pub weekday: Option<QuietWindowUpdate>,
  pub weekend: Option<QuietWindowUpdate>,
}

impl QuietHoursUpdate {
  pub fn merged_into(&self, config: &QuietHoursConfig) -> Result<QuietHoursConfig, SettingsError> {
    let mut next = *config;
    if let Some(update) = &self.weekday {
      next.weekday = update.merged_into(&config.weekday)?;
    }
    if let Some(update) = &self.weekend {
      next.weekend = update.merged_into(&config.weekend)?;
    }
    Ok(next)
  }
}

/// Batched settings write. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
  pub adaptive_enabled: Option<bool>,
  pub base_interval: Option<u64>,
  /// Raw mode text; parsed case-insensitively.
  pub source_mode: Option<String>,
  pub quiet_hours: Option<QuietHoursUpdate>,
  pub wp_api_enabled: Option<bool>,
}

/// Settings read model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsView {
  pub adaptive_enabled: bool,
  pub base_interval: u64,
  pub current_interval: u64,
  pub unchanged_count: u32,
  pub source_mode: SourceMode,
  pub quiet_hours: QuietHoursConfig,
  pub wp_api_enabled: bool,
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveTime;

  #[test]
  fn test_window_update_keeps_unset_fields() {
    let window = QuietWindow::new(
      false,
      NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
      NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
    );
    let update = QuietWindowUpdate { enabled: Some(true), start: Some("19:15".into()), end: None };
    let merged = update.merged_into(&window).unwrap();
    assert!(merged.enabled);
    assert_eq!(merged.start, NaiveTime::from_hms_opt(19, 15, 0).unwrap());
    assert_eq!(merged.end, window.end);
  }

  #[test]
  fn test_window_update_rejects_bad_time() {
    let update = QuietWindowUpdate { enabled: Some(true), start: None, end: Some("8pm".into()) };
    let err = update.merged_into(&QuietHoursConfig::default().weekday).unwrap_err();
    assert_eq!(err, SettingsError::InvalidTime("8pm".into()));
  }

  #[test]
  fn test_update_deserializes_partial_json() {
    let update: SettingsUpdate =
      serde_json::from_str(r#"{"base_interval": 300, "quiet_hours": {"weekend": {"enabled": true}}}"#)
        .unwrap();
    assert_eq!(update.base_interval, Some(300));
    assert!(update.adaptive_enabled.is_none());
    assert_eq!(update.quiet_hours.unwrap().weekend.unwrap().enabled, Some(true));
  }
}
