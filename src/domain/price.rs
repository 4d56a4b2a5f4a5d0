//! Core price domain types.
//!
//! Defines the normalized observation (`PriceRecord`) produced by every
//! source adapter and the compact `HistoryEntry` projection retained when
//! a genuine price change is detected.
//!
//! Prices are `f64` at this boundary: upstream publishes whole baht values
//! and the statistics layer converts to `Decimal` where rounding matters.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Direction of a price movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Unchanged,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Absolute amount plus direction of a price delta.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceChange {
    /// Absolute size of the move (never negative).
    pub amount: f64,
    pub direction: Direction,
}

impl PriceChange {
    /// Build from a signed delta. Zero maps to `unchanged` with amount 0.
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Self { amount: delta, direction: Direction::Up }
        } else if delta < 0.0 {
            Self { amount: -delta, direction: Direction::Down }
        } else {
            Self::unchanged()
        }
    }

    pub const fn unchanged() -> Self {
        Self { amount: 0.0, direction: Direction::Unchanged }
    }
}

/// Buy/sell quote for one product category.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PricePair {
    pub buy: Option<f64>,
    pub sell: Option<f64>,
}

impl PricePair {
    pub const fn new(buy: Option<f64>, sell: Option<f64>) -> Self {
        Self { buy, sell }
    }

    /// True when neither side could be parsed.
    pub const fn is_empty(&self) -> bool {
        self.buy.is_none() && self.sell.is_none()
    }
}

/// Which family of adapter produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Api,
    Scraper,
}

impl SourceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Scraper => "scraper",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of the upstream price board, successful or not.
///
/// `timestamp` is the local wall-clock time of the fetch; `update_time` and
/// `update_date` are whatever text the upstream published and may follow a
/// different clock entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<FixedOffset>,
    pub gold_bar: PricePair,
    pub gold_ornament: PricePair,
    pub update_time: Option<String>,
    pub update_date: Option<String>,
    /// Delta vs. the preceding accepted record. `None` when the source did
    /// not publish one; the tracker derives it locally.
    pub price_change: Option<PriceChange>,
    /// Delta vs. the first accepted record of the calendar day.
    pub today_change: Option<PriceChange>,
    /// Upstream announcement counter for the trading day. Equality only.
    pub change_count: u32,
    pub source: String,
    pub source_type: SourceType,
}

impl PriceRecord {
    /// Empty successful record for an adapter to fill in.
    pub fn new(
        source: impl Into<String>,
        source_type: SourceType,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            success: false,
            error: None,
            timestamp,
            gold_bar: PricePair::default(),
            gold_ornament: PricePair::default(),
            update_time: None,
            update_date: None,
            price_change: None,
            today_change: None,
            change_count: 0,
            source: source.into(),
            source_type,
        }
    }

    /// Failed observation carrying a human-readable error.
    pub fn failed(
        source: impl Into<String>,
        source_type: SourceType,
        timestamp: DateTime<FixedOffset>,
        error: impl Into<String>,
    ) -> Self {
        let mut record = Self::new(source, source_type, timestamp);
        record.error = Some(error.into());
        record
    }

    /// Compact projection kept in the history buffer.
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            timestamp: self.timestamp,
            gold_bar: self.gold_bar,
            gold_ornament: self.gold_ornament,
            price_change: self.price_change.unwrap_or_default(),
            update_time: self.update_time.clone(),
            change_count: self.change_count,
        }
    }
}

/// Durable projection of a `PriceRecord`, created only on a detected change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub gold_bar: PricePair,
    pub gold_ornament: PricePair,
    pub price_change: PriceChange,
    pub update_time: Option<String>,
    pub change_count: u32,
}
