//! Gold Traders Source - HTML Price Board Scraper
//!
//! Extracts bar/ornament buy/sell and the as-of line from the
//! association's classic board, where each value sits in a span with a
//! stable server-generated id. The board does not publish deltas, so
//! `price_change`/`today_change` are left absent for the tracker to derive.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use super::http::{build_client, get_text};
use super::{parse_announcement_count, parse_price_text};
use crate::domain::price::{PricePair, PriceRecord, SourceType};
use crate::ports::clock::Clock;
use crate::ports::price_source::{FetchError, PriceSource};

const ID_PREFIX: &str = "DetailPlace_uc_goldprices1_lbl";

static SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span[^>]*\bid="DetailPlace_uc_goldprices1_lbl(\w+)"[^>]*>([^<]*)</span>"#)
        .expect("static regex")
});

static THAI_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}/\d{2}/\d{4}").expect("static regex"));

/// Labelled values found on the board, keyed by id suffix.
#[derive(Debug, Default)]
struct BoardFields {
    bar_sell: Option<String>,
    bar_buy: Option<String>,
    ornament_sell: Option<String>,
    ornament_buy: Option<String>,
    as_of: Option<String>,
}

impl BoardFields {
    fn extract(html: &str) -> Self {
        let mut fields = Self::default();
        for caps in SPAN.captures_iter(html) {
            let value = caps[2].trim().to_string();
            match &caps[1] {
                "BLSell" => fields.bar_sell = Some(value),
                "BLBuy" => fields.bar_buy = Some(value),
                "OMSell" => fields.ornament_sell = Some(value),
                "OMBuy" => fields.ornament_buy = Some(value),
                "AsTime" => fields.as_of = Some(value),
                _ => {}
            }
        }
        fields
    }
}

/// HTML scraper adapter for the Gold Traders Association board.
pub struct GoldTradersSource {
    http: Client,
    url: String,
    clock: Arc<dyn Clock>,
}

impl GoldTradersSource {
    /// Create a new scraper source with its own request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            url: url.into(),
            clock,
        })
    }

    /// Normalize a raw board page observed at `timestamp`.
    pub fn parse_page(
        html: &str,
        source: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<PriceRecord, FetchError> {
        let fields = BoardFields::extract(html);
        let price = |v: &Option<String>| v.as_deref().and_then(parse_price_text);

        let mut record = PriceRecord::new(source, SourceType::Scraper, timestamp);
        record.gold_bar = PricePair::new(price(&fields.bar_buy), price(&fields.bar_sell));
        record.gold_ornament =
            PricePair::new(price(&fields.ornament_buy), price(&fields.ornament_sell));

        if record.gold_bar.buy.is_none() || record.gold_bar.sell.is_none() {
            return Err(FetchError::Parse(format!(
                "could not find {ID_PREFIX}BLBuy/BLSell on page"
            )));
        }

        if let Some(as_of) = fields.as_of.filter(|s| !s.is_empty()) {
            record.update_date = THAI_DATE.find(&as_of).map(|m| m.as_str().to_string());
            record.change_count = parse_announcement_count(&as_of).unwrap_or(0);
            record.update_time = Some(as_of);
        }

        record.success = true;
        Ok(record)
    }
}

#[async_trait]
impl PriceSource for GoldTradersSource {
    #[instrument(skip(self), fields(source = %self.url))]
    async fn fetch(&self) -> Result<PriceRecord, FetchError> {
        let html = get_text(&self.http, &self.url).await.inspect_err(|e| {
            warn!(error = %e, "Gold Traders request failed");
        })?;
        let record = Self::parse_page(&html, &self.url, self.clock.now())?;
        debug!(
            bar_sell = ?record.gold_bar.sell,
            change_count = record.change_count,
            "Gold Traders board scraped"
        );
        Ok(record)
    }

    fn name(&self) -> &str {
        &self.url
    }

    fn source_type(&self) -> SourceType {
        SourceType::Scraper
    }
}
