//! Clock Port - Local Wall-clock Time
//!
//! "Local time" throughout the tracker means a fixed UTC offset taken from
//! configuration (the upstream publishes on Bangkok time, which has no DST).
//! Injecting the clock keeps day/hour policies deterministic under test.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};

/// Source of the current local time.
pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> DateTime<FixedOffset>;
}

/// Real time at a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
  offset: FixedOffset,
}

impl SystemClock {
  pub const fn new(offset: FixedOffset) -> Self {
    Self { offset }
  }

  /// Clock from an offset in minutes east of UTC; falls back to UTC if out of range.
  pub fn from_offset_minutes(minutes: i32) -> Self {
    let offset = FixedOffset::east_opt(minutes * 60)
      .unwrap_or_else(|| Utc.fix());
    Self::new(offset)
  }
}

impl Clock for SystemClock {
  fn now(&self) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&self.offset)
  }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
  pub const fn new(start: DateTime<FixedOffset>) -> Self {
    Self { now: Mutex::new(start) }
  }

  pub fn set(&self, now: DateTime<FixedOffset>) {
    if let Ok(mut guard) = self.now.lock() {
      *guard = now;
    }
  }

  pub fn advance(&self, by: Duration) {
    if let Ok(mut guard) = self.now.lock() {
      *guard += by;
    }
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<FixedOffset> {
    self.now
      .lock()
      .map_or_else(|poisoned| *poisoned.into_inner(), |guard| *guard)
  }
}
