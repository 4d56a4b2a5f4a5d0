//! Gold Price Tracker - Entry Point
//!
//! Initializes configuration, logging, upstream sources and the tracker
//! service, then serves the JSON API until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate (path from the first CLI argument)
//! 2. Init tracing (JSON structured logging)
//! 3. Build clock, source adapters, orchestrator, history file, metrics
//! 4. Restore history from disk
//! 5. Start the scheduler; fetch immediately if there is no snapshot yet
//! 6. Spawn the API server
//! 7. Wait for SIGINT → graceful shutdown (stop scheduler→flush→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use gold_price_tracker::adapters::http::{ApiServer, ApiState};
use gold_price_tracker::adapters::metrics::MetricsRegistry;
use gold_price_tracker::adapters::persistence::JsonHistoryRepository;
use gold_price_tracker::adapters::sources::{AuroraSource, GoldApiSource, GoldTradersSource};
use gold_price_tracker::config::{self, ScraperKind};
use gold_price_tracker::ports::clock::{Clock, SystemClock};
use gold_price_tracker::ports::price_source::PriceSource;
use gold_price_tracker::usecases::{FetchOrchestrator, PriceTracker, Scheduler, TrackerOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.sources.mode,
        scraper = %config.sources.scraper,
        base_interval_secs = config.polling.base_interval_secs,
        adaptive = config.polling.adaptive_enabled,
        "Starting gold price tracker"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Build adapters and services ──────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::from_offset_minutes(
        config.service.utc_offset_minutes,
    ));
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);

    let api = Arc::new(
        GoldApiSource::new(
            config.sources.api_url.clone(),
            Duration::from_secs(config.sources.api_timeout_secs),
            Arc::clone(&clock),
        )
        .context("Failed to create API source")?,
    );
    let scraper_url = config.sources.scraper_endpoint().to_string();
    let scraper_timeout = Duration::from_secs(config.sources.scraper_timeout_secs);
    let scraper: Arc<dyn PriceSource> = match config.sources.scraper {
        ScraperKind::Goldtraders => Arc::new(
            GoldTradersSource::new(scraper_url, scraper_timeout, Arc::clone(&clock))
                .context("Failed to create scraper source")?,
        ),
        ScraperKind::Aurora => Arc::new(
            AuroraSource::new(scraper_url, scraper_timeout, Arc::clone(&clock))
                .context("Failed to create scraper source")?,
        ),
    };

    let orchestrator = FetchOrchestrator::new(api, scraper, Arc::clone(&clock), Arc::clone(&metrics))
        .with_stale_after(chrono::Duration::minutes(config.sources.stale_after_minutes))
        .with_change_merge(config.sources.change_merge);

    let repository = Arc::new(
        JsonHistoryRepository::new(&config.persistence.history_file)
            .await
            .context("Failed to open history file")?,
    );

    let tracker = Arc::new(PriceTracker::new(
        orchestrator,
        repository,
        Arc::clone(&clock),
        Arc::clone(&metrics),
        TrackerOptions::from_config(&config),
    ));

    // ── 5. Restore history ──────────────────────────────────
    tracker.load().await;

    // ── 6. Start scheduler + initial fetch ──────────────────
    let scheduler = Arc::new(Scheduler::new(tracker.period()));
    let tick_tracker = Arc::clone(&tracker);
    scheduler
        .start(move || {
            let tracker = Arc::clone(&tick_tracker);
            async move {
                tracker.scheduled_fetch().await;
            }
        })
        .await;

    if tracker.current().await.is_none() {
        let outcome = tracker.fetch_now().await;
        if !outcome.is_success() {
            warn!(outcome = ?outcome, "Initial fetch failed, serving no data until next tick");
        }
    }

    // ── 7. Spawn API server ─────────────────────────────────
    let api_state = Arc::new(ApiState {
        tracker: Arc::clone(&tracker),
        scheduler: Arc::clone(&scheduler),
        metrics: Arc::clone(&metrics),
        service_name: config.service.name.clone(),
    });
    let server = ApiServer::new(api_state, config.server.bind_address.clone());
    let server_shutdown = shutdown_tx.subscribe();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(server_shutdown).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("Tracker running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown ───────────────────────────────────
    let _ = shutdown_tx.send(());

    if let Err(e) = tracker.shutdown(&scheduler).await {
        error!(error = %e, "Final history flush failed");
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), server_handle).await;

    info!("Shutdown complete");
    Ok(())
}
