//! Source selection mode and the cross-source change merge rule.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::price::PriceRecord;

/// Which adapter(s) the orchestrator invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Primary JSON API only.
    Api,
    /// HTML scraper only.
    Scraper,
    /// API first; scraper on failure or staleness.
    #[default]
    Auto,
}

impl SourceMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Scraper => "scraper",
            Self::Auto => "auto",
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "scraper" => Ok(Self::Scraper),
            "auto" => Ok(Self::Auto),
            other => Err(other.to_string()),
        }
    }
}

/// How `auto` mode fills `price_change`/`today_change` when the fallback
/// replaces a stale primary result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeMerge {
    /// Copy the primary's fields only where the fallback left them absent.
    #[default]
    BackfillEmpty,
    /// Keep the fallback's fields as-is, even when absent.
    FallbackOnly,
    /// Always take the primary's fields when it has them.
    PreferPrimary,
}

impl ChangeMerge {
    /// Merge the primary's change fields into the fallback result.
    pub fn apply(self, fallback: &mut PriceRecord, primary: &PriceRecord) {
        match self {
            Self::FallbackOnly => {}
            Self::BackfillEmpty => {
                if fallback.price_change.is_none() {
                    fallback.price_change = primary.price_change;
                }
                if fallback.today_change.is_none() {
                    fallback.today_change = primary.today_change;
                }
            }
            Self::PreferPrimary => {
                if primary.price_change.is_some() {
                    fallback.price_change = primary.price_change;
                }
                if primary.today_change.is_some() {
                    fallback.today_change = primary.today_change;
                }
            }
        }
    }
}
