//! History File - Atomic JSON History Snapshot
//!
//! Persists the full history buffer as one pretty-printed JSON array,
//! oldest entry first. Every flush rewrites the file wholesale using a
//! tmp-then-rename write, so a reader never observes a partial file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::domain::price::HistoryEntry;
use crate::ports::history_repository::HistoryRepository;

/// JSON file implementation of [`HistoryRepository`].
pub struct JsonHistoryRepository {
    /// Final snapshot path.
    path: PathBuf,
    /// Sibling path used for the atomic write.
    tmp_path: PathBuf,
}

impl JsonHistoryRepository {
    /// Create a repository for `path`, creating its parent directory.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create history directory {}", dir.display()))?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        Ok(Self { path, tmp_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryRepository for JsonHistoryRepository {
    #[instrument(skip(self, entries), fields(path = %self.path.display(), entries = entries.len()))]
    async fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).context("Failed to serialize history")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp history file")?;

        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename history file")?;

        debug!("History snapshot written");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Vec<HistoryEntry>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            info!("No history file found, starting empty");
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&self.path)
            .await
            .context("Failed to read history file")?;

        let entries: Vec<HistoryEntry> =
            serde_json::from_str(&json).context("Failed to parse history JSON")?;

        info!(entries = entries.len(), "History file loaded");
        Ok(entries)
    }

    async fn is_healthy(&self) -> bool {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return true; // First run is OK
        }
        fs::metadata(&self.path).await.is_ok()
    }
}
