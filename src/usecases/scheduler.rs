//! Scheduler - Non-overlapping Periodic Ticker
//!
//! Drives a tick task at the period held in a shared [`TickPeriod`].
//! Each tick is awaited inline by a single loop task, so a tick can never
//! run in parallel with itself; ticks missed while one is in flight are
//! skipped rather than queued. A period change is picked up after the
//! in-flight tick (if any) completes and applies from the next tick on.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Shared, observable polling period.
///
/// Written by the tracker (adaptive recompute, settings changes) and read
/// by the scheduler loop.
#[derive(Debug, Clone)]
pub struct TickPeriod {
  tx: Arc<watch::Sender<Duration>>,
}

impl TickPeriod {
  pub fn new(period: Duration) -> Self {
    let (tx, _rx) = watch::channel(period);
    Self { tx: Arc::new(tx) }
  }

  pub fn from_secs(secs: u64) -> Self {
    Self::new(Duration::from_secs(secs))
  }

  /// Current period.
  pub fn get(&self) -> Duration {
    *self.tx.borrow()
  }

  /// Replace the period. A running scheduler restarts its interval from
  /// now once any in-flight tick completes. Returns `true` if the value
  /// changed.
  pub fn reschedule(&self, period: Duration) -> bool {
    let changed = self.tx.send_if_modified(|current| {
      if *current == period {
        false
      } else {
        *current = period;
        true
      }
    });
    if changed {
      debug!(period_secs = period.as_secs(), "Reschedule requested");
    }
    changed
  }

  pub fn subscribe(&self) -> watch::Receiver<Duration> {
    self.tx.subscribe()
  }
}

/// Abstract ticker with start/stop/run-now controls; rescheduling goes
/// through the shared [`TickPeriod`].
pub struct Scheduler {
  period: TickPeriod,
  running: Arc<AtomicBool>,
  run_now: Arc<Notify>,
  stop_tx: Mutex<Option<broadcast::Sender<()>>>,
  handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
  pub fn new(period: TickPeriod) -> Self {
    Self {
      period,
      running: Arc::new(AtomicBool::new(false)),
      run_now: Arc::new(Notify::new()),
      stop_tx: Mutex::new(None),
      handle: tokio::sync::Mutex::new(None),
    }
  }

  /// Spawn the tick loop. The first tick fires one period from now.
  ///
  /// Returns `false` (and does nothing) if already running.
  pub async fn start<F, Fut>(&self, task: F) -> bool
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let mut handle = self.handle.lock().await;
    if self.running.swap(true, Ordering::SeqCst) {
      return false;
    }

    let (stop_tx, stop_rx) = broadcast::channel(1);
    if let Ok(mut slot) = self.stop_tx.lock() {
      *slot = Some(stop_tx);
    }

    let period = self.period.clone();
    let run_now = Arc::clone(&self.run_now);
    let running = Arc::clone(&self.running);
    *handle = Some(tokio::spawn(async move {
      tick_loop(task, period, run_now, stop_rx).await;
      running.store(false, Ordering::SeqCst);
    }));

    info!(period_secs = self.period.get().as_secs(), "Scheduler started");
    true
  }

  /// Stop the loop, letting an in-flight tick finish first.
  pub async fn stop(&self) {
    let stop_tx = self.stop_tx.lock().ok().and_then(|mut slot| slot.take());
    if let Some(tx) = stop_tx {
      let _ = tx.send(());
    }

    let handle = self.handle.lock().await.take();
    if let Some(handle) = handle {
      if let Err(e) = handle.await {
        warn!(error = %e, "Scheduler task ended abnormally");
      }
      info!("Scheduler stopped");
    }
    self.running.store(false, Ordering::SeqCst);
  }

  /// Request an immediate tick. Coalesces with an in-flight tick.
  pub fn run_now(&self) {
    self.run_now.notify_one();
  }

  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }

  pub fn period(&self) -> Duration {
    self.period.get()
  }
}

fn ticker(period: Duration) -> Interval {
  let period = period.max(Duration::from_millis(1));
  let mut ticker = interval_at(Instant::now() + period, period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
  ticker
}

#[instrument(skip_all)]
async fn tick_loop<F, Fut>(
  task: F,
  period: TickPeriod,
  run_now: Arc<Notify>,
  mut stop_rx: broadcast::Receiver<()>,
) where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  let mut period_rx = period.subscribe();
  let mut current = *period_rx.borrow_and_update();
  let mut interval = ticker(current);

  loop {
    tokio::select! {
      biased;
      _ = stop_rx.recv() => break,
      changed = period_rx.changed() => {
        if changed.is_err() {
          break;
        }
        let next = *period_rx.borrow_and_update();
        if next != current {
          info!(
            from_secs = current.as_secs(),
            to_secs = next.as_secs(),
            "Polling interval rescheduled"
          );
          current = next;
          interval = ticker(current);
        }
      }
      _ = run_now.notified() => task().await,
      _ = interval.tick() => task().await,
    }
  }
}
