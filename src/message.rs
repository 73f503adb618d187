//! Command protocol between the hosting application and the controller
//!
//! Commands are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "SKIP_WAITING"}
//! {"type": "GET_CACHE_SIZE"}
//! {"type": "CLEAR_CACHE", "cacheName": "images-v1"}
//! {"type": "PRELOAD_MODELS", "urls": ["/models/face.json"]}
//! ```
//!
//! Replies are untagged: `{"success": true}`, `{"error": "..."}`, or the
//! storage estimate (`null` when the backend has no quota to report).

use crate::error::CacheResult;
use crate::store::StorageEstimate;
use serde::{Deserialize, Serialize};

/// Command sent to the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Activate an installed version now
    SkipWaiting,

    /// Report storage usage
    GetCacheSize,

    /// Delete one store
    ClearCache {
        #[serde(rename = "cacheName")]
        cache_name: String,
    },

    /// Prefetch model URLs into the model store
    PreloadModels { urls: Vec<String> },
}

impl Command {
    /// Parse a command from JSON text
    pub fn parse(json: &str) -> CacheResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reply to a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Ack { success: bool },
    Error { error: String },
    Usage(Option<StorageEstimate>),
}

impl Reply {
    pub fn ok() -> Self {
        Self::Ack { success: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn to_json(&self) -> CacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
