//! Integration Tests - Tracker, Orchestrator and Scheduler
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone};
use mockall::mock;

use gold_price_tracker::adapters::metrics::MetricsRegistry;
use gold_price_tracker::domain::price::{HistoryEntry, PriceChange, PricePair, PriceRecord, SourceType};
use gold_price_tracker::domain::quiet_hours::{QuietHoursConfig, QuietWindow};
use gold_price_tracker::ports::clock::{Clock, ManualClock};
use gold_price_tracker::ports::price_source::FetchError;
use gold_price_tracker::usecases::settings::{SettingsError, SettingsUpdate};
use gold_price_tracker::usecases::tracker::{
    ApplyOutcome, PriceTracker, RefreshOutcome, TickOutcome, TrackerOptions,
};
use gold_price_tracker::usecases::{FetchOrchestrator, Scheduler};

// ---- Mock Definitions ----

mock! {
    pub PriceSrc {}

    #[async_trait::async_trait]
    impl gold_price_tracker::ports::price_source::PriceSource for PriceSrc {
        async fn fetch(&self) -> Result<PriceRecord, FetchError>;
        fn name(&self) -> &str;
        fn source_type(&self) -> SourceType;
    }
}

mock! {
    pub HistoryRepo {}

    #[async_trait::async_trait]
    impl gold_price_tracker::ports::history_repository::HistoryRepository for HistoryRepo {
        async fn save(&self, entries: &[HistoryEntry]) -> anyhow::Result<()>;
        async fn load(&self) -> anyhow::Result<Vec<HistoryEntry>>;
        async fn is_healthy(&self) -> bool;
    }
}

// ---- Helpers ----

/// Monday 2026-10-19 10:00 local, inside the trading window.
fn monday_morning() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(7 * 3600)
        .unwrap()
        .with_ymd_and_hms(2026, 10, 19, 10, 0, 0)
        .unwrap()
}

fn source(kind: SourceType) -> MockPriceSrc {
    let mut mock = MockPriceSrc::new();
    mock.expect_name().return_const(kind.as_str().to_string());
    mock.expect_source_type().return_const(kind);
    mock
}

fn record(clock: &ManualClock, kind: SourceType, change_count: u32, bar_sell: f64) -> PriceRecord {
    let mut r = PriceRecord::new(kind.as_str(), kind, clock.now());
    r.success = true;
    r.gold_bar = PricePair::new(Some(bar_sell - 100.0), Some(bar_sell));
    r.gold_ornament = PricePair::new(Some(bar_sell - 700.0), Some(bar_sell + 800.0));
    r.update_time = Some(clock.now().format("%H:%M").to_string());
    r.change_count = change_count;
    r
}

/// API mock replaying `counts` in order, one per fetch.
fn scripted_api(clock: &Arc<ManualClock>, counts: Vec<u32>) -> MockPriceSrc {
    let mut api = source(SourceType::Api);
    let times = counts.len();
    let mut counts: VecDeque<u32> = counts.into();
    let clock = Arc::clone(clock);
    api.expect_fetch().times(times).returning(move || {
        let count = counts.pop_front().unwrap_or_default();
        Ok(record(&clock, SourceType::Api, count, 40_000.0 + f64::from(count) * 50.0))
    });
    api
}

fn empty_repo() -> MockHistoryRepo {
    let mut repo = MockHistoryRepo::new();
    repo.expect_load().returning(|| Ok(Vec::new()));
    repo.expect_is_healthy().return_const(true);
    repo
}

fn build(
    clock: &Arc<ManualClock>,
    api: MockPriceSrc,
    scraper: MockPriceSrc,
    repo: MockHistoryRepo,
    options: TrackerOptions,
) -> PriceTracker {
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let orchestrator = FetchOrchestrator::new(
        Arc::new(api),
        Arc::new(scraper),
        clock.clone(),
        Arc::clone(&metrics),
    );
    PriceTracker::new(orchestrator, Arc::new(repo), clock.clone(), metrics, options)
}

fn entry(minute: u32, change_count: u32) -> HistoryEntry {
    HistoryEntry {
        timestamp: monday_morning() + chrono::Duration::minutes(i64::from(minute)),
        gold_bar: PricePair::new(Some(40_000.0), Some(40_100.0)),
        gold_ornament: PricePair::new(Some(39_400.0), Some(40_900.0)),
        price_change: PriceChange::unchanged(),
        update_time: None,
        change_count,
    }
}

// ---- Change Detection ----

#[tokio::test]
async fn test_change_count_sequence_drives_history_and_repeats() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let api = scripted_api(&clock, vec![5, 5, 5, 6, 6]);
    let tracker = build(&clock, api, source(SourceType::Scraper), empty_repo(), TrackerOptions::default());

    let mut outcomes = Vec::new();
    let mut unchanged = Vec::new();
    for _ in 0..5 {
        outcomes.push(tracker.fetch_now().await);
        unchanged.push(tracker.settings().await.unchanged_count);
        clock.advance(chrono::Duration::minutes(1));
    }

    assert_eq!(unchanged, vec![0, 1, 2, 0, 1]);
    assert_eq!(outcomes[0], ApplyOutcome::Changed { change_count: 5 });
    assert_eq!(outcomes[3], ApplyOutcome::Changed { change_count: 6 });
    assert_eq!(outcomes.iter().filter(|o| matches!(o, ApplyOutcome::Changed { .. })).count(), 2);

    let page = tracker.history(60, 0).await;
    assert_eq!(page.total, 2);
    assert_eq!(page.data[0].change_count, 6);
    assert_eq!(page.data[1].change_count, 5);

    // The snapshot follows every successful fetch, repeats included.
    let current = tracker.current().await.unwrap();
    assert_eq!(current.timestamp, monday_morning() + chrono::Duration::minutes(4));
}

#[tokio::test]
async fn test_first_fetch_of_zero_counter_is_a_change() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let api = scripted_api(&clock, vec![0]);
    let tracker = build(&clock, api, source(SourceType::Scraper), empty_repo(), TrackerOptions::default());
    assert_eq!(tracker.fetch_now().await, ApplyOutcome::Changed { change_count: 0 });
    assert_eq!(tracker.history(60, 0).await.total, 1);
}

#[tokio::test]
async fn test_all_sources_failed_keeps_last_snapshot() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let mut api = source(SourceType::Api);
    let mut calls = 0;
    let api_clock = Arc::clone(&clock);
    api.expect_fetch().times(2).returning(move || {
        calls += 1;
        if calls == 1 {
            Ok(record(&api_clock, SourceType::Api, 3, 40_100.0))
        } else {
            Err(FetchError::Network("connection reset".into()))
        }
    });
    let mut scraper = source(SourceType::Scraper);
    scraper.expect_fetch().times(1).returning(|| Err(FetchError::Http { status: 502 }));

    let tracker = build(&clock, api, scraper, empty_repo(), TrackerOptions::default());
    tracker.fetch_now().await;
    let before = tracker.current().await;

    let error = match tracker.fetch_now().await {
        ApplyOutcome::Failed { error } => error,
        other => panic!("expected failure, got {other:?}"),
    };
    assert!(error.contains("connection reset"));
    assert!(error.contains("502"));
    assert_eq!(tracker.current().await, before);
}

#[tokio::test]
async fn test_current_reads_are_idempotent() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let api = scripted_api(&clock, vec![9]);
    let tracker = build(&clock, api, source(SourceType::Scraper), empty_repo(), TrackerOptions::default());
    tracker.fetch_now().await;

    let first = serde_json::to_string(&tracker.current().await).unwrap();
    let second = serde_json::to_string(&tracker.current().await).unwrap();
    assert_eq!(first, second);
}

// ---- Orchestrator Staleness ----

#[tokio::test]
async fn test_stale_primary_triggers_fallback_attempt() {
    let clock = Arc::new(ManualClock::new(monday_morning()));

    let mut api = source(SourceType::Api);
    let api_clock = Arc::clone(&clock);
    api.expect_fetch().times(1).returning(move || {
        let mut r = record(&api_clock, SourceType::Api, 4, 40_100.0);
        r.update_time = Some("09:15".to_string()); // 45 minutes old
        r.price_change = Some(PriceChange::from_delta(-50.0));
        r.today_change = Some(PriceChange::from_delta(100.0));
        Ok(r)
    });

    let mut scraper = source(SourceType::Scraper);
    let scraper_clock = Arc::clone(&clock);
    scraper
        .expect_fetch()
        .times(1)
        .returning(move || Ok(record(&scraper_clock, SourceType::Scraper, 5, 40_150.0)));

    let tracker = build(&clock, api, scraper, empty_repo(), TrackerOptions::default());
    tracker.fetch_now().await;

    let current = tracker.current().await.unwrap();
    assert_eq!(current.source_type, SourceType::Scraper);
    assert_eq!(current.change_count, 5);
    // Backfilled from the stale primary.
    assert_eq!(current.price_change, Some(PriceChange::from_delta(-50.0)));
    assert_eq!(current.today_change, Some(PriceChange::from_delta(100.0)));
}

// ---- Forced Refresh ----

#[tokio::test]
async fn test_forced_refresh_is_rate_limited() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let api = scripted_api(&clock, vec![1, 2]);
    let tracker = build(&clock, api, source(SourceType::Scraper), empty_repo(), TrackerOptions::default());

    let RefreshOutcome::Refreshed { snapshot: first, .. } = tracker.force_refresh().await else {
        panic!("first refresh must run");
    };
    let first = first.unwrap();

    clock.advance(chrono::Duration::seconds(10));
    match tracker.force_refresh().await {
        RefreshOutcome::RateLimited { snapshot, retry_after } => {
            assert_eq!(snapshot.as_ref(), Some(&first));
            assert_eq!(retry_after, Duration::from_secs(20));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }

    clock.advance(chrono::Duration::seconds(21));
    let RefreshOutcome::Refreshed { outcome, snapshot } = tracker.force_refresh().await else {
        panic!("refresh after cooldown must run");
    };
    assert_eq!(outcome, ApplyOutcome::Changed { change_count: 2 });
    assert_eq!(snapshot.unwrap().change_count, 2);
}

// ---- Quiet Hours ----

#[tokio::test]
async fn test_quiet_hours_skip_ticks_but_not_forced_refresh() {
    let clock = Arc::new(ManualClock::new(
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, 23, 0, 0)
            .unwrap(),
    ));
    let api = scripted_api(&clock, vec![1]);
    let options = TrackerOptions {
        quiet_hours: QuietHoursConfig {
            weekday: QuietWindow::new(
                true,
                chrono::NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            ),
            ..QuietHoursConfig::default()
        },
        ..TrackerOptions::default()
    };
    let tracker = build(&clock, api, source(SourceType::Scraper), empty_repo(), options);

    assert_eq!(tracker.scheduled_fetch().await, TickOutcome::QuietHours);
    assert!(tracker.current().await.is_none());

    assert!(matches!(tracker.force_refresh().await, RefreshOutcome::Refreshed { .. }));
    assert!(tracker.current().await.is_some());
}

// ---- Settings ----

#[tokio::test]
async fn test_out_of_range_interval_rejected_without_mutation() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let tracker = build(
        &clock,
        source(SourceType::Api),
        source(SourceType::Scraper),
        empty_repo(),
        TrackerOptions::default(),
    );

    let ok = SettingsUpdate { base_interval: Some(300), ..SettingsUpdate::default() };
    tracker.update_settings(ok).await.unwrap();
    assert_eq!(tracker.period().get(), Duration::from_secs(300));

    let bad = SettingsUpdate { base_interval: Some(700), ..SettingsUpdate::default() };
    let err = tracker.update_settings(bad).await.unwrap_err();
    assert_eq!(err, SettingsError::IntervalOutOfRange { value: 700, min: 60, max: 600 });

    let view = tracker.settings().await;
    assert_eq!(view.base_interval, 300);
    assert_eq!(view.current_interval, 300);
    assert_eq!(tracker.period().get(), Duration::from_secs(300));
}

#[tokio::test]
async fn test_source_mode_switch_routes_to_scraper() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let mut scraper = source(SourceType::Scraper);
    let scraper_clock = Arc::clone(&clock);
    scraper
        .expect_fetch()
        .times(1)
        .returning(move || Ok(record(&scraper_clock, SourceType::Scraper, 2, 40_000.0)));
    let tracker = build(&clock, source(SourceType::Api), scraper, empty_repo(), TrackerOptions::default());

    let update = SettingsUpdate { source_mode: Some("SCRAPER".into()), ..SettingsUpdate::default() };
    tracker.update_settings(update).await.unwrap();
    tracker.fetch_now().await;
    assert_eq!(tracker.current().await.unwrap().source_type, SourceType::Scraper);
}

// ---- Persistence ----

#[tokio::test]
async fn test_flush_every_ten_changes_and_on_shutdown() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let api = scripted_api(&clock, (1..=11).collect());

    let mut repo = empty_repo();
    repo.expect_save().withf(|entries| entries.len() == 10).times(1).returning(|_| Ok(()));
    repo.expect_save().withf(|entries| entries.len() == 11).times(1).returning(|_| Ok(()));

    let tracker = build(&clock, api, source(SourceType::Scraper), repo, TrackerOptions::default());
    for _ in 0..11 {
        tracker.fetch_now().await;
        clock.advance(chrono::Duration::minutes(1));
    }

    let scheduler = Scheduler::new(tracker.period());
    tracker.shutdown(&scheduler).await.unwrap();
}

#[tokio::test]
async fn test_load_caps_to_capacity_keeping_newest() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let mut repo = MockHistoryRepo::new();
    repo.expect_load()
        .times(1)
        .returning(|| Ok((0..1500).map(|i| entry(i, i)).collect()));

    let tracker = build(
        &clock,
        source(SourceType::Api),
        source(SourceType::Scraper),
        repo,
        TrackerOptions::default(),
    );
    assert_eq!(tracker.load().await, 1440);

    let page = tracker.history(usize::MAX, 0).await;
    assert_eq!(page.total, 1440);
    assert_eq!(page.limit, 1440);
    assert_eq!(page.data.first().unwrap().change_count, 1499);
    assert_eq!(page.data.last().unwrap().change_count, 60);
}

#[tokio::test]
async fn test_unreadable_history_starts_empty() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let mut repo = MockHistoryRepo::new();
    repo.expect_load().returning(|| Err(anyhow::anyhow!("corrupt file")));
    let tracker = build(
        &clock,
        source(SourceType::Api),
        source(SourceType::Scraper),
        repo,
        TrackerOptions::default(),
    );
    assert_eq!(tracker.load().await, 0);
    assert_eq!(tracker.history(60, 0).await.total, 0);
}

// ---- Summary ----

#[tokio::test]
async fn test_summary_requires_data_and_rounds() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let api = scripted_api(&clock, vec![1, 2, 3]);
    let tracker = build(&clock, api, source(SourceType::Scraper), empty_repo(), TrackerOptions::default());
    assert!(tracker.summary().await.is_none());

    for _ in 0..3 {
        tracker.fetch_now().await;
    }
    let summary = tracker.summary().await.unwrap();
    assert_eq!(summary.statistics.records_count, 3);
    assert_eq!(summary.statistics.gold_bar.high, Some(40_150.0));
    assert_eq!(summary.statistics.gold_bar.low, Some(40_050.0));
    assert_eq!(summary.statistics.gold_bar.average, Some(40_100.0));
    assert_eq!(summary.current.change_count, 3);
}

// ---- Scheduler ----

#[tokio::test(start_paused = true)]
async fn test_adaptive_reschedule_applies_from_next_tick() {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let api = scripted_api(&clock, vec![7; 7]);
    let options = TrackerOptions {
        adaptive_enabled: true,
        base_interval: 60,
        ..TrackerOptions::default()
    };
    let tracker = Arc::new(build(&clock, api, source(SourceType::Scraper), empty_repo(), options));
    let scheduler = Scheduler::new(tracker.period());

    let tick_tracker = Arc::clone(&tracker);
    scheduler
        .start(move || {
            let tracker = Arc::clone(&tick_tracker);
            async move {
                tracker.scheduled_fetch().await;
            }
        })
        .await;

    // Six ticks at 60s: one change then five repeats → short-idle tier (90s).
    tokio::time::sleep(Duration::from_secs(6 * 60 + 1)).await;
    assert_eq!(tracker.settings().await.unchanged_count, 5);
    assert_eq!(scheduler.period(), Duration::from_secs(90));

    // Next tick arrives 90s after the reschedule, not 60s.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(tracker.settings().await.unchanged_count, 5);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(tracker.settings().await.unchanged_count, 6);

    scheduler.stop().await;
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_ticks_never_overlap() {
    let scheduler = Scheduler::new(gold_price_tracker::usecases::TickPeriod::from_secs(1));
    let in_flight = Arc::new(AtomicU32::new(0));
    let max_in_flight = Arc::new(AtomicU32::new(0));
    let ticks = Arc::new(AtomicU32::new(0));

    let (a, m, t) = (Arc::clone(&in_flight), Arc::clone(&max_in_flight), Arc::clone(&ticks));
    scheduler
        .start(move || {
            let (a, m, t) = (Arc::clone(&a), Arc::clone(&m), Arc::clone(&t));
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2500)).await;
                a.fetch_sub(1, Ordering::SeqCst);
                t.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

    scheduler.run_now();
    tokio::time::sleep(Duration::from_secs(20)).await;
    scheduler.stop().await;

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    let ticks = ticks.load(Ordering::SeqCst);
    assert!((5..=10).contains(&ticks), "unexpected tick count {ticks}");
}
