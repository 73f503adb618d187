//! Lifecycle event journal
//!
//! Appends JSON lines to `<state dir>/journal.log`: one line per install,
//! activation, store purge, store clear and model prefetch.

use crate::config::{schema::Config, ConfigManager};
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Event names written to the journal
pub mod events {
    pub const INSTALLED: &str = "worker.installed";
    pub const INSTALL_FAILED: &str = "worker.install_failed";
    pub const ACTIVATED: &str = "worker.activated";
    pub const STORE_PURGED: &str = "store.purged";
    pub const STORE_CLEARED: &str = "store.cleared";
    pub const MODELS_PREFETCHED: &str = "models.prefetched";
}

/// File-based journal that appends JSON lines
#[derive(Debug, Clone)]
pub struct Journal {
    enabled: bool,
    path: PathBuf,
}

impl Journal {
    /// Create a journal from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.journal,
            path: ConfigManager::journal_path(),
        }
    }

    /// Journal at an explicit path
    pub fn at(path: PathBuf) -> Self {
        Self {
            enabled: true,
            path,
        }
    }

    /// A journal that records nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    /// Record an event
    ///
    /// IO failures are logged and dropped; the lifecycle never waits on
    /// the journal succeeding.
    pub async fn record(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write journal: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
