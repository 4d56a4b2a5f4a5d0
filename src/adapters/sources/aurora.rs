//! Aurora Source - Intraday Announcement Table Scraper
//!
//! Aurora's price list opens with a table of today's announcements, newest
//! first after two header rows. Each row carries
//! `time | round | bar buy | bar sell | ornament buy | change`. A second
//! table ends with a `สรุปราคาทองระหว่างวัน` line holding the net move for
//! the day. Unlike the association board this page publishes deltas, so
//! both `price_change` and `today_change` come from the source.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use super::http::{build_client, get_text};
use super::parse_price_text;
use crate::domain::price::{PriceChange, PricePair, PriceRecord, SourceType};
use crate::ports::clock::Clock;
use crate::ports::price_source::{FetchError, PriceSource};

const DAY_SUMMARY_LABEL: &str = "สรุปราคาทองระหว่างวัน";

static TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b.*?</table>").expect("static regex"));

static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b.*?</tr>").expect("static regex"));

static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("static regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

static ORNAMENT_SELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span[^>]*class="[^"]*aurora-gold-v5__price-value--sale[^"]*"[^>]*>(.*?)</span>"#)
        .expect("static regex")
});

static SIGNED_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-]?)([0-9,]+)").expect("static regex"));

static TRAILING_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-]?[0-9,]+)\s*$").expect("static regex"));

/// Visible text of an HTML fragment, whitespace collapsed.
fn text_of(fragment: &str) -> String {
    TAG.replace_all(fragment, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `+150`, `-50`, `1,200` (unsigned non-zero is up). Anything else is unchanged.
fn parse_change(text: &str) -> PriceChange {
    let Some(caps) = SIGNED_AMOUNT.captures(text.trim()) else {
        return PriceChange::unchanged();
    };
    let amount: f64 = caps[2].replace(',', "").parse().unwrap_or(0.0);
    match &caps[1] {
        "-" => PriceChange::from_delta(-amount),
        _ => PriceChange::from_delta(amount),
    }
}

/// HTML scraper adapter for the Aurora price list.
pub struct AuroraSource {
    http: Client,
    url: String,
    clock: Arc<dyn Clock>,
}

impl AuroraSource {
    pub fn new(url: impl Into<String>, timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            url: url.into(),
            clock,
        })
    }

    /// Normalize a raw price-list page observed at `timestamp`.
    pub fn parse_page(
        html: &str,
        source: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<PriceRecord, FetchError> {
        let tables: Vec<&str> = TABLE.find_iter(html).map(|m| m.as_str()).collect();
        let today = tables
            .first()
            .ok_or_else(|| FetchError::Parse("no price tables found".to_string()))?;

        let latest = ROW
            .find_iter(today)
            .nth(2)
            .ok_or_else(|| FetchError::Parse("not enough rows in price table".to_string()))?;
        let cells: Vec<String> = CELL
            .captures_iter(latest.as_str())
            .map(|caps| text_of(&caps[1]))
            .collect();
        if cells.len() < 6 {
            return Err(FetchError::Parse(format!("expected 6 cells, got {}", cells.len())));
        }

        let mut record = PriceRecord::new(source, SourceType::Scraper, timestamp);
        record.gold_bar = PricePair::new(parse_price_text(&cells[2]), parse_price_text(&cells[3]));
        let ornament_sell = ORNAMENT_SELL
            .captures(html)
            .and_then(|caps| parse_price_text(&text_of(&caps[1])));
        record.gold_ornament = PricePair::new(parse_price_text(&cells[4]), ornament_sell);

        if record.gold_bar.buy.is_none() || record.gold_bar.sell.is_none() {
            return Err(FetchError::Parse("could not parse bar prices".to_string()));
        }

        record.change_count = cells[1].trim().parse().unwrap_or(0);
        record.price_change = Some(parse_change(&cells[5]));
        record.today_change = Some(
            tables
                .get(1)
                .and_then(|summary| {
                    ROW.find_iter(summary)
                        .map(|row| text_of(row.as_str()))
                        .find(|text| text.contains(DAY_SUMMARY_LABEL))
                })
                .and_then(|line| TRAILING_AMOUNT.captures(&line).map(|caps| parse_change(&caps[1])))
                .unwrap_or_else(PriceChange::unchanged),
        );

        let date = timestamp.format("%d/%m/%Y").to_string();
        record.update_time = Some(format!(
            "{date} เวลา {} (ครั้งที่ {})",
            cells[0], record.change_count
        ));
        record.update_date = Some(date);

        record.success = true;
        Ok(record)
    }
}

#[async_trait]
impl PriceSource for AuroraSource {
    #[instrument(skip(self), fields(source = %self.url))]
    async fn fetch(&self) -> Result<PriceRecord, FetchError> {
        let html = get_text(&self.http, &self.url).await.inspect_err(|e| {
            warn!(error = %e, "Aurora request failed");
        })?;
        let record = Self::parse_page(&html, &self.url, self.clock.now())?;
        debug!(
            bar_sell = ?record.gold_bar.sell,
            change_count = record.change_count,
            price_change = ?record.price_change,
            "Aurora price list scraped"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::Direction;
    use chrono::TimeZone;

    fn ts() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 3, 11, 0, 0)
            .unwrap()
    }

    const PAGE: &str = r#"
        <div class="aurora-gold-v5">
          <span class="aurora-gold-v5__price-value aurora-gold-v5__price-value--sale">41,700</span>
        </div>
        <table class="today">
          <tr><th colspan="6">ราคาทองวันนี้</th></tr>
          <tr><th>เวลา</th><th>ครั้งที่</th><th>รับซื้อ</th><th>ขายออก</th><th>รูปพรรณรับซื้อ</th><th>ขึ้น/ลง</th></tr>
          <tr><td>10:54</td><td>19</td><td>40,700</td><td><b>40,900</b></td><td>39,857.24</td><td>-150</td></tr>
          <tr><td>09:30</td><td>18</td><td>40,850</td><td>41,050</td><td>40,004.20</td><td>+50</td></tr>
        </table>
        <table class="summary">
          <tr><td>ราคาเปิดตลาด</td><td>41,000</td></tr>
          <tr><td>สรุปราคาทองระหว่างวัน</td><td>-100</td></tr>
        </table>
    "#;

    #[test]
    fn test_parse_latest_announcement() {
        let record = AuroraSource::parse_page(PAGE, "aurora", ts()).unwrap();
        assert!(record.success);
        assert_eq!(record.source_type, SourceType::Scraper);
        assert_eq!(record.gold_bar, PricePair::new(Some(40_700.0), Some(40_900.0)));
        assert_eq!(record.gold_ornament, PricePair::new(Some(39_857.24), Some(41_700.0)));
        assert_eq!(record.change_count, 19);
        assert_eq!(record.update_date.as_deref(), Some("03/02/2026"));
        assert_eq!(
            record.update_time.as_deref(),
            Some("03/02/2026 เวลา 10:54 (ครั้งที่ 19)")
        );
    }

    #[test]
    fn test_publishes_both_deltas() {
        let record = AuroraSource::parse_page(PAGE, "aurora", ts()).unwrap();
        let price = record.price_change.unwrap();
        assert_eq!(price.direction, Direction::Down);
        assert!((price.amount - 150.0).abs() < f64::EPSILON);
        let today = record.today_change.unwrap();
        assert_eq!(today.direction, Direction::Down);
        assert!((today.amount - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_summary_and_ornament_sell() {
        let page = r#"
            <table>
              <tr><th>a</th></tr><tr><th>b</th></tr>
              <tr><td>14:05</td><td>x</td><td>40,700</td><td>40,900</td><td>39,857</td><td></td></tr>
            </table>
        "#;
        let record = AuroraSource::parse_page(page, "aurora", ts()).unwrap();
        assert_eq!(record.change_count, 0);
        assert_eq!(record.gold_ornament.sell, None);
        assert_eq!(record.price_change, Some(PriceChange::unchanged()));
        assert_eq!(record.today_change, Some(PriceChange::unchanged()));
    }

    #[test]
    fn test_short_table_is_parse_error() {
        let page = "<table><tr><th>a</th></tr><tr><td>10:54</td></tr></table>";
        let err = AuroraSource::parse_page(page, "aurora", ts()).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));

        let err = AuroraSource::parse_page("<p>maintenance</p>", "aurora", ts()).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn test_change_text() {
        assert_eq!(parse_change("+1,200"), PriceChange::from_delta(1_200.0));
        assert_eq!(parse_change("50"), PriceChange::from_delta(50.0));
        assert_eq!(parse_change("-50"), PriceChange::from_delta(-50.0));
        assert_eq!(parse_change("0"), PriceChange::unchanged());
        assert_eq!(parse_change("-"), PriceChange::unchanged());
    }
}
