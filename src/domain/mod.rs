//! Domain layer - Core price tracking logic and models.
//!
//! Pure types and policies: price records, the bounded change history,
//! the change detector, the adaptive interval table, quiet-hours windows,
//! source selection and the staleness check. No I/O here (hexagonal
//! architecture inner ring); every time-dependent function takes `now`
//! explicitly.

pub mod adaptive;
pub mod detector;
pub mod history;
pub mod price;
pub mod quiet_hours;
pub mod source_mode;
pub mod staleness;

// Re-export core types for convenience
pub use adaptive::{AdaptiveState, IntervalPolicy, IntervalPreset};
pub use detector::Observation;
pub use history::{HistoryBuffer, HistorySummary, SeriesStats, DEFAULT_HISTORY_CAPACITY};
pub use price::{Direction, HistoryEntry, PriceChange, PricePair, PriceRecord, SourceType};
pub use quiet_hours::{QuietHoursConfig, QuietWindow};
pub use source_mode::{ChangeMerge, SourceMode};
