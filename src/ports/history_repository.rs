//! History Repository Port - Durable Change History
//!
//! Persisted storage is a full snapshot of the in-memory history buffer,
//! rewritten wholesale on each flush and read wholesale on startup. It is
//! never an append log.

use async_trait::async_trait;

use crate::domain::price::HistoryEntry;

/// Trait for history persistence providers.
#[async_trait]
pub trait HistoryRepository: Send + Sync + 'static {
  /// Replace the stored history with `entries` (oldest first).
  async fn save(&self, entries: &[HistoryEntry]) -> anyhow::Result<()>;

  /// Load the stored history, oldest first. Empty on first startup.
  async fn load(&self) -> anyhow::Result<Vec<HistoryEntry>>;

  /// Check if the storage location is usable.
  async fn is_healthy(&self) -> bool;
}
