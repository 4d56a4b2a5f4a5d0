//! Quiet Hours - Local-time Windows That Suppress Scheduled Polling
//!
//! Each day type (weekday, weekend) carries its own `{enabled, start, end}`
//! window. A window whose start is after its end wraps past midnight.
//! Quiet hours gate whether a scheduled tick fetches at all; they are
//! independent of the adaptive interval's off-hours lengthening.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// A single time-of-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietWindow {
    #[serde(default)]
    pub enabled: bool,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl QuietWindow {
    pub const fn new(enabled: bool, start: NaiveTime, end: NaiveTime) -> Self {
        Self { enabled, start, end }
    }

    /// Whether `now` falls inside the window, ignoring `enabled`.
    ///
    /// `start > end` wraps midnight: active when `now >= start || now < end`.
    /// Otherwise active when `start <= now < end`; `start == end` never matches.
    pub fn contains(&self, now: NaiveTime) -> bool {
        // Compare at minute precision; the window is configured in HH:MM.
        let now = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now);
        if self.start > self.end {
            now >= self.start || now < self.end
        } else {
            self.start <= now && now < self.end
        }
    }

    /// Whether the window is enabled and contains `now`.
    pub fn is_active(&self, now: NaiveTime) -> bool {
        self.enabled && self.contains(now)
    }
}

/// Per-day-type quiet windows.
///
/// Deserializes field by field: anything omitted keeps the value from
/// `QuietHoursConfig::default()` for that day type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PartialQuietHours")]
pub struct QuietHoursConfig {
    pub weekday: QuietWindow,
    pub weekend: QuietWindow,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        Self {
            weekday: QuietWindow::new(false, at(18, 0), at(8, 30)),
            weekend: QuietWindow::new(false, at(0, 0), at(23, 59)),
        }
    }
}

impl QuietHoursConfig {
    /// Window that applies on the given date.
    pub fn window_for(&self, now: &DateTime<FixedOffset>) -> &QuietWindow {
        if is_weekend(now.weekday()) {
            &self.weekend
        } else {
            &self.weekday
        }
    }

    /// Whether scheduled polling is suppressed at `now` (local time).
    pub fn is_quiet(&self, now: &DateTime<FixedOffset>) -> bool {
        self.window_for(now).is_active(now.time())
    }
}

/// One window as written in config; every field optional.
#[derive(Debug, Default, Deserialize)]
struct PartialWindow {
    enabled: Option<bool>,
    #[serde(default, deserialize_with = "hhmm::deserialize_opt")]
    start: Option<NaiveTime>,
    #[serde(default, deserialize_with = "hhmm::deserialize_opt")]
    end: Option<NaiveTime>,
}

impl PartialWindow {
    fn over(self, base: QuietWindow) -> QuietWindow {
        QuietWindow {
            enabled: self.enabled.unwrap_or(base.enabled),
            start: self.start.unwrap_or(base.start),
            end: self.end.unwrap_or(base.end),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialQuietHours {
    #[serde(default)]
    weekday: PartialWindow,
    #[serde(default)]
    weekend: PartialWindow,
}

impl From<PartialQuietHours> for QuietHoursConfig {
    fn from(partial: PartialQuietHours) -> Self {
        let base = Self::default();
        Self {
            weekday: partial.weekday.over(base.weekday),
            weekend: partial.weekend.over(base.weekend),
        }
    }
}

pub(crate) const fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Parse a `"HH:MM"` string (also accepts `"HH:MM:SS"`).
pub fn parse_hhmm(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

/// Serde adapter for `"HH:MM"` time-of-day strings.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw)
    }

    pub fn deserialize_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| parse(&raw))
            .transpose()
    }

    fn parse<E: serde::de::Error>(raw: &str) -> Result<NaiveTime, E> {
        super::parse_hhmm(raw)
            .ok_or_else(|| E::custom(format!("invalid time of day '{raw}', expected HH:MM")))
    }
}
