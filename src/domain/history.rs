//! History Buffer - Bounded FIFO of Detected Price Changes
//!
//! Holds at most `capacity` entries in insertion (time) order. Once full,
//! each append evicts exactly the oldest entry. All read projections return
//! newest-first.

use std::collections::VecDeque;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::Serialize;

use super::price::{HistoryEntry, PriceChange, PriceRecord};

/// Default retention: one entry per minute for 24 hours.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1440;

/// High/low/average over one price series. All `None` for an empty series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SeriesStats {
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub average: Option<f64>,
}

impl SeriesStats {
    /// Statistics rounded to 2 decimal places.
    pub fn from_series(values: &[f64]) -> Self {
        let decimals: Vec<Decimal> = values
            .iter()
            .filter_map(|v| Decimal::from_f64(*v))
            .collect();
        if decimals.is_empty() {
            return Self::default();
        }

        let high = decimals.iter().copied().max().unwrap_or_default();
        let low = decimals.iter().copied().min().unwrap_or_default();
        let sum: Decimal = decimals.iter().copied().sum();
        let average = sum / Decimal::from(decimals.len());

        let round = |d: Decimal| d.round_dp(2).to_f64();
        Self {
            high: round(high),
            low: round(low),
            average: round(average),
        }
    }
}

/// Aggregate statistics over all retained sell prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistorySummary {
    pub records_count: usize,
    pub gold_bar: SeriesStats,
    pub gold_ornament: SeriesStats,
}

/// Bounded time-ordered buffer of change events.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Build from persisted entries, keeping only the newest `capacity`.
    pub fn from_entries(entries: Vec<HistoryEntry>, capacity: usize) -> Self {
        let mut buffer = Self::new(capacity);
        let skip = entries.len().saturating_sub(buffer.capacity);
        buffer.entries.extend(entries.into_iter().skip(skip));
        buffer
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append, evicting the oldest entry when at capacity.
    /// Returns the evicted entry, if any.
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Full oldest-first copy, the shape written to durable storage.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Newest-first page. `limit` is capped at the buffer capacity.
    pub fn page(&self, limit: usize, offset: usize) -> Vec<HistoryEntry> {
        let limit = limit.min(self.capacity);
        self.entries
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Entries whose local timestamp falls on `date`, newest-first.
    pub fn on_date(&self, date: NaiveDate) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.timestamp.date_naive() == date)
            .cloned()
            .collect()
    }

    /// First entry recorded on `date`.
    pub fn first_on_date(&self, date: NaiveDate) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.timestamp.date_naive() == date)
    }

    /// High/low/average of retained bar and ornament sell prices.
    pub fn summary(&self) -> HistorySummary {
        let sells = |pick: fn(&HistoryEntry) -> Option<f64>| -> Vec<f64> {
            self.entries
                .iter()
                .filter_map(pick)
                .filter(|p| *p > 0.0)
                .collect()
        };
        HistorySummary {
            records_count: self.entries.len(),
            gold_bar: SeriesStats::from_series(&sells(|e| e.gold_bar.sell)),
            gold_ornament: SeriesStats::from_series(&sells(|e| e.gold_ornament.sell)),
        }
    }

    /// Fill in `price_change`/`today_change` the source did not supply.
    ///
    /// `price_change` is the bar-sell delta vs. the latest retained entry;
    /// `today_change` the delta vs. the first entry of the record's calendar
    /// day. Must run before the record itself is appended.
    pub fn derive_changes(&self, record: &mut PriceRecord) {
        let Some(sell) = record.gold_bar.sell else {
            record.price_change.get_or_insert_with(PriceChange::unchanged);
            record.today_change.get_or_insert_with(PriceChange::unchanged);
            return;
        };

        if record.price_change.is_none() {
            let previous = self.latest().and_then(|e| e.gold_bar.sell);
            record.price_change = Some(delta_from(sell, previous));
        }

        if record.today_change.is_none() {
            let opening = self
                .first_on_date(record.timestamp.date_naive())
                .and_then(|e| e.gold_bar.sell);
            record.today_change = Some(delta_from(sell, opening));
        }
    }
}

fn delta_from(current: f64, reference: Option<f64>) -> PriceChange {
    reference.map_or_else(PriceChange::unchanged, |r| PriceChange::from_delta(current - r))
}
