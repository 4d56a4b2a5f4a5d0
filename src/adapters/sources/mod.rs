//! Price Source Adapters - Upstream Price Boards
//!
//! Concrete `PriceSource` implementations:
//! - `GoldApiSource`: Primary JSON API (`source_type = api`)
//! - `GoldTradersSource`: Gold Traders Association HTML board (`source_type = scraper`)
//! - `AuroraSource`: Aurora intraday price list, publishes its own deltas (`source_type = scraper`)
//!
//! Each adapter owns one `reqwest::Client` with its own timeout and
//! no other mutable state.

pub mod aurora;
pub mod gold_api;
pub mod goldtraders;
pub mod http;

use std::sync::LazyLock;

use regex::Regex;

pub use aurora::AuroraSource;
pub use gold_api::GoldApiSource;
pub use goldtraders::GoldTradersSource;

static ANNOUNCEMENT_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ครั้งที่\s*(\d+)").expect("static regex"));

/// Extract the daily announcement counter from `"... (ครั้งที่ 19)"`.
pub fn parse_announcement_count(text: &str) -> Option<u32> {
    ANNOUNCEMENT_COUNT
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse a published price such as `"40,100.00"`; empty or zero is absent.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok().filter(|p| *p > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announcement_count() {
        let text = "ประกาศวันที่ 03/02/2569 เวลา 10:54 น. (ครั้งที่ 19)";
        assert_eq!(parse_announcement_count(text), Some(19));
        assert_eq!(parse_announcement_count("no counter"), None);
    }

    #[test]
    fn test_price_text() {
        assert_eq!(parse_price_text("40,100.00"), Some(40_100.0));
        assert_eq!(parse_price_text(" 39,950 "), Some(39_950.0));
        assert_eq!(parse_price_text(""), None);
        assert_eq!(parse_price_text("0.00"), None);
        assert_eq!(parse_price_text("-"), None);
    }
}
