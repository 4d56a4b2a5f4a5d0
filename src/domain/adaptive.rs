//! Adaptive Interval Controller - Polling Period From Trading Activity
//!
//! Computes the next polling interval from the base interval, the number
//! of consecutive repeat observations, and the local weekday/hour:
//!
//! | condition                                   | multiplier         |
//! |---------------------------------------------|--------------------|
//! | weekend, or hour outside the trading window | `off_hours_factor` |
//! | `unchanged_count >= long_idle_after`        | `long_idle_factor` |
//! | `unchanged_count >= short_idle_after`       | `short_idle_factor`|
//! | otherwise                                   | ×1                 |
//!
//! Rows are evaluated top-down; the first match wins.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

use super::quiet_hours::is_weekend;

/// Named multiplier presets observed in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPreset {
    /// Off-hours ×5, ≥10 repeats ×3, ≥5 repeats ×1.5.
    #[default]
    Standard,
    /// Off-hours ×10, ≥10 repeats ×5, ≥5 repeats ×3.
    Aggressive,
}

/// Deterministic multiplier table for the adaptive controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalPolicy {
    pub off_hours_factor: f64,
    pub long_idle_factor: f64,
    pub short_idle_factor: f64,
    pub long_idle_after: u32,
    pub short_idle_after: u32,
    /// First local hour of the trading window (inclusive).
    pub trading_start_hour: u32,
    /// Local hour the trading window closes (exclusive).
    pub trading_end_hour: u32,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self::from_preset(IntervalPreset::Standard)
    }
}

impl IntervalPolicy {
    pub const fn from_preset(preset: IntervalPreset) -> Self {
        let (off, long, short) = match preset {
            IntervalPreset::Standard => (5.0, 3.0, 1.5),
            IntervalPreset::Aggressive => (10.0, 5.0, 3.0),
        };
        Self {
            off_hours_factor: off,
            long_idle_factor: long,
            short_idle_factor: short,
            long_idle_after: 10,
            short_idle_after: 5,
            trading_start_hour: 9,
            trading_end_hour: 17,
        }
    }

    /// Weekend, or a local hour outside `[trading_start_hour, trading_end_hour)`.
    pub fn is_off_hours(&self, now: &DateTime<FixedOffset>) -> bool {
        let hour = now.hour();
        is_weekend(now.weekday())
            || hour < self.trading_start_hour
            || hour >= self.trading_end_hour
    }

    /// Multiplier selected by the priority table.
    pub fn multiplier(&self, unchanged_count: u32, now: &DateTime<FixedOffset>) -> f64 {
        if self.is_off_hours(now) {
            self.off_hours_factor
        } else if unchanged_count >= self.long_idle_after {
            self.long_idle_factor
        } else if unchanged_count >= self.short_idle_after {
            self.short_idle_factor
        } else {
            1.0
        }
    }

    /// Desired interval in seconds, rounded to the nearest whole second.
    pub fn desired_interval(
        &self,
        base_interval: u64,
        unchanged_count: u32,
        now: &DateTime<FixedOffset>,
    ) -> u64 {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = (base_interval as f64 * self.multiplier(unchanged_count, now)).round() as u64;
        scaled.max(1)
    }
}

/// Process-lifetime polling state.
///
/// Mutated only by the change detector and the controller, always under the
/// tracker's exclusive lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdaptiveState {
    pub base_interval: u64,
    pub current_interval: u64,
    pub unchanged_count: u32,
    /// `None` until the first successful fetch, which always counts as a change.
    pub last_change_count: Option<u32>,
}

impl AdaptiveState {
    pub const fn new(base_interval: u64) -> Self {
        Self {
            base_interval,
            current_interval: base_interval,
            unchanged_count: 0,
            last_change_count: None,
        }
    }

    /// Recompute the interval. Returns the new value only when it differs.
    pub fn recompute(
        &mut self,
        policy: &IntervalPolicy,
        now: &DateTime<FixedOffset>,
    ) -> Option<u64> {
        let desired = policy.desired_interval(self.base_interval, self.unchanged_count, now);
        if desired == self.current_interval {
            return None;
        }
        self.current_interval = desired;
        Some(desired)
    }

    /// Replace the base interval; the current interval snaps back to it.
    pub const fn set_base(&mut self, base_interval: u64) {
        self.base_interval = base_interval;
        self.current_interval = base_interval;
    }
}
