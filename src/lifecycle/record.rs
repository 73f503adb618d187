//! Persisted worker record
//!
//! Describes the version that last installed or activated, saved as JSON
//! next to the stores. A failed install never writes it, so the record
//! keeps naming the previously active version.

use crate::error::{CacheError, CacheResult};
use crate::lifecycle::WorkerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

/// File name of the record inside the store root
pub const RECORD_FILE: &str = "worker.json";

/// Installed/active worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Unique install ID
    pub id: Uuid,

    /// Store version tag
    pub version: String,

    /// Last persisted state
    pub state: WorkerState,

    /// When install completed
    pub installed_at: DateTime<Utc>,

    /// When activation completed
    pub activated_at: Option<DateTime<Utc>>,
}

impl WorkerRecord {
    /// Record for a freshly installed version
    pub fn installed(version: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: version.into(),
            state: WorkerState::Installed,
            installed_at: at,
            activated_at: None,
        }
    }

    /// Mark the record active
    pub fn activate(&mut self, at: DateTime<Utc>) {
        self.state = WorkerState::Active;
        self.activated_at = Some(at);
    }

    /// Load a record, `None` if the file does not exist
    pub async fn load(path: &Path) -> CacheResult<Option<Self>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| CacheError::io(format!("reading worker record {}", path.display()), e))?;

        let record: WorkerRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    /// Save the record
    pub async fn save(&self, path: &Path) -> CacheResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io("creating worker record directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .map_err(|e| CacheError::io(format!("writing worker record {}", path.display()), e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RECORD_FILE);

        let mut record = WorkerRecord::installed("v3", Utc::now());
        record.activate(Utc::now());
        record.save(&path).await.unwrap();

        let loaded = WorkerRecord::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.state, WorkerState::Active);
        assert!(loaded.activated_at.is_some());
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = WorkerRecord::load(&dir.path().join(RECORD_FILE)).await.unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn state_serializes_lowercase() {
        let record = WorkerRecord::installed("v1", Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"state\":\"installed\""));
    }
}
