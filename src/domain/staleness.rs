//! Staleness check for upstream publication times.
//!
//! Upstreams report their publication time as free-form text
//! (`"10:54"`, `"03/02/2569 เวลา 10:54 น."`, ISO timestamps). Only the first
//! clock reading is used. A reading later than the local clock is
//! assumed to belong to the previous day.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime};
use regex::Regex;

// `HH:MM` anywhere, or the Thai `HH.MM น.` form. A bare `1.50` is a number, not a time.
static CLOCK_READING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})(?::(\d{2})|\.(\d{2})\s*น\.)").expect("static regex")
});

/// Extract the first `HH:MM` reading from upstream text.
pub fn parse_clock_reading(text: &str) -> Option<NaiveTime> {
    CLOCK_READING.captures_iter(text).find_map(|caps| {
        let hour = caps[1].parse().ok()?;
        let minute = caps.get(2).or_else(|| caps.get(3))?.as_str().parse().ok()?;
        NaiveTime::from_hms_opt(hour, minute, 0)
    })
}

/// Time elapsed since the upstream's reported publication, if parseable.
pub fn publication_age(update_time: &str, now: &DateTime<FixedOffset>) -> Option<Duration> {
    let clock = parse_clock_reading(update_time)?;
    let mut published = now.date_naive().and_time(clock);
    if published > now.naive_local() {
        published -= Duration::days(1);
    }
    Some(now.naive_local() - published)
}

/// Whether the reported publication is older than `threshold`.
///
/// Missing or unparseable times are never stale: there is nothing to judge.
pub fn is_stale(
    update_time: Option<&str>,
    now: &DateTime<FixedOffset>,
    threshold: Duration,
) -> bool {
    update_time
        .and_then(|text| publication_age(text, now))
        .is_some_and(|age| age > threshold)
}
