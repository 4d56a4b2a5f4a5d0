//! Change Detector - Genuine Change vs. Repeat Observation
//!
//! Upstreams bump an announcement counter (`change_count`) each time the
//! official price board is republished. Comparing that counter against the
//! last accepted value is the only signal used: prices themselves may repeat
//! across announcements. The counter resets daily, so only equality matters.

use super::adaptive::AdaptiveState;

/// Outcome of comparing one successful fetch against the last accepted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// New announcement: a history entry must be appended.
    Changed { change_count: u32 },
    /// Same announcement seen again.
    Repeated { unchanged_count: u32 },
}

impl Observation {
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Update `state` for a successful fetch carrying `change_count`.
///
/// The first observation after startup (`last_change_count == None`) is
/// always a change. Feeding the same counter twice is idempotent with
/// respect to history: only the repeat counter moves.
pub fn observe(state: &mut AdaptiveState, change_count: u32) -> Observation {
    if state.last_change_count == Some(change_count) {
        state.unchanged_count = state.unchanged_count.saturating_add(1);
        Observation::Repeated {
            unchanged_count: state.unchanged_count,
        }
    } else {
        state.unchanged_count = 0;
        state.last_change_count = Some(change_count);
        Observation::Changed { change_count }
    }
}

/// Repeat counts worth an info-level log line: 1, 5, 10, 20, 30, ...
pub const fn is_log_milestone(unchanged_count: u32) -> bool {
    matches!(unchanged_count, 1 | 5) || (unchanged_count > 0 && unchanged_count % 10 == 0)
}
