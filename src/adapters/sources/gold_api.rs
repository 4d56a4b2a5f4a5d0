//! Gold API Source - Primary JSON Price Feed
//!
//! Polls a JSON mirror of the Gold Traders Association board. The feed
//! publishes a single signed `change` for the bar price, which is used for
//! both `price_change` and `today_change`, and a human-readable
//! `update_info` line carrying the announcement counter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument, warn};

use super::http::{build_client, get_text};
use super::{parse_announcement_count, parse_price_text};
use crate::domain::price::{PriceChange, PricePair, PriceRecord, SourceType};
use crate::ports::clock::Clock;
use crate::ports::price_source::{FetchError, PriceSource};

/// Top-level API payload.
#[derive(Debug, Deserialize)]
struct GoldApiPayload {
    current_prices: CurrentPrices,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct CurrentPrices {
    gold_bar: ApiQuote,
    #[serde(default)]
    gold_ornament: ApiQuote,
}

#[derive(Debug, Default, Deserialize)]
struct ApiQuote {
    #[serde(default, deserialize_with = "flexible_price")]
    buy: Option<f64>,
    #[serde(default, deserialize_with = "flexible_price")]
    sell: Option<f64>,
    /// Signed delta vs. the previous announcement.
    #[serde(default, deserialize_with = "flexible_signed")]
    change: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    publish_date: Option<String>,
    last_updated: Option<String>,
    #[serde(default)]
    update_info: String,
}

/// Accepts `40100`, `40100.0` or `"40,100"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn flexible_price<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<NumberOrText>::deserialize(d)? {
        Some(NumberOrText::Number(n)) if n > 0.0 => Some(n),
        Some(NumberOrText::Text(t)) => parse_price_text(&t),
        _ => None,
    })
}

fn flexible_signed<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<NumberOrText>::deserialize(d)? {
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(t)) => {
            let negative = t.trim_start().starts_with('-');
            parse_price_text(&t)
                .map(|v| if negative { -v } else { v })
                .or(Some(0.0))
        }
        None => None,
    })
}

/// Primary JSON API adapter.
pub struct GoldApiSource {
    http: Client,
    url: String,
    clock: Arc<dyn Clock>,
}

impl GoldApiSource {
    /// Create a new API source with its own request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            url: url.into(),
            clock,
        })
    }

    /// Normalize a raw API body observed at `timestamp`.
    pub fn parse_body(
        body: &str,
        source: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<PriceRecord, FetchError> {
        let payload: GoldApiPayload = serde_json::from_str(body)
            .map_err(|e| FetchError::Parse(format!("invalid API payload: {e}")))?;

        let bar = &payload.current_prices.gold_bar;
        let ornament = &payload.current_prices.gold_ornament;

        let mut record = PriceRecord::new(source, SourceType::Api, timestamp);
        record.gold_bar = PricePair::new(bar.buy, bar.sell);
        record.gold_ornament = PricePair::new(ornament.buy, ornament.sell);

        if record.gold_bar.is_empty() && record.gold_ornament.is_empty() {
            return Err(FetchError::Parse("API payload carried no prices".to_string()));
        }

        let change = bar.change.map(PriceChange::from_delta);
        record.price_change = change;
        record.today_change = change;

        record.update_date = payload.metadata.publish_date;
        record.update_time = payload.metadata.last_updated;
        record.change_count = parse_announcement_count(&payload.metadata.update_info).unwrap_or(0);
        record.success = true;
        Ok(record)
    }
}

#[async_trait]
impl PriceSource for GoldApiSource {
    #[instrument(skip(self), fields(source = %self.url))]
    async fn fetch(&self) -> Result<PriceRecord, FetchError> {
        let body = get_text(&self.http, &self.url).await.inspect_err(|e| {
            warn!(error = %e, "Gold API request failed");
        })?;
        let record = Self::parse_body(&body, &self.url, self.clock.now())?;
        debug!(
            bar_sell = ?record.gold_bar.sell,
            change_count = record.change_count,
            "Gold API fetched"
        );
        Ok(record)
    }

    fn name(&self) -> &str {
        &self.url
    }

    fn source_type(&self) -> SourceType {
        SourceType::Api
    }
}
