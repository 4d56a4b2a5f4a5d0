//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! tracker's workflows.
//!
//! Use cases:
//! - `FetchOrchestrator`: primary/fallback source selection
//! - `PriceTracker`: cache, history, change detection, adaptive interval
//! - `Scheduler`: non-overlapping periodic ticker
//! - `settings`: batched runtime settings updates

pub mod orchestrator;
pub mod scheduler;
pub mod settings;
pub mod tracker;

pub use orchestrator::FetchOrchestrator;
pub use scheduler::{Scheduler, TickPeriod};
pub use settings::{SettingsError, SettingsUpdate, SettingsView};
pub use tracker::{ApplyOutcome, CurrentRead, PriceTracker, RefreshOutcome, TickOutcome, TrackerOptions};
