//! Error types for flipcache
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for flipcache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in flipcache
#[derive(Error, Debug)]
pub enum CacheError {
    // Request errors
    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("No cached response available for {url}")]
    NotCached { url: String },

    #[error("Offline and no cached response for {url}")]
    Offline { url: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    // Route table errors
    #[error("Invalid route pattern for {route}: {reason}")]
    InvalidRoute { route: String, reason: String },

    // Store errors
    #[error("Cache store not found: {0}")]
    StoreNotFound(String),

    #[error("Invalid cache store name '{0}'. Use letters, digits, '.', '_' or '-'")]
    InvalidStoreName(String),

    #[error("Corrupt cache entry in {store}: {reason}")]
    CorruptEntry { store: String, reason: String },

    // Lifecycle errors
    #[error("Install failed, required asset {url} could not be cached: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Cannot {action} while worker is {state}")]
    InvalidTransition { action: String, state: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network failure error
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Offline { .. })
    }

    /// Whether this error means "neither network nor cache could answer"
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::NotCached { .. } | Self::Offline { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Network { .. } => Some("Check connectivity, cached copies are served when present"),
            Self::NotCached { .. } => Some("Run: flipcache install, or prefetch the URL first"),
            Self::Offline { .. } => Some("Reconnect and retry the request"),
            Self::InstallFailed { .. } => {
                Some("Every manifest URL must be reachable. Check [install].manifest in the config")
            }
            Self::InvalidStoreName(_) => Some("Run: flipcache stores list"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CacheError::NotCached {
            url: "https://cdn.example/a.js".to_string(),
        };
        assert!(err.to_string().contains("No cached response available"));
    }

    #[test]
    fn error_hint() {
        let err = CacheError::network("https://cdn.example/a.js", "connection refused");
        assert!(err.hint().is_some());
        assert!(CacheError::Internal("x".to_string()).hint().is_none());
    }

    #[test]
    fn error_retryable() {
        assert!(CacheError::network("u", "r").is_retryable());
        assert!(!CacheError::NotCached { url: "u".into() }.is_retryable());
    }

    #[test]
    fn error_unavailable() {
        assert!(CacheError::NotCached { url: "u".into() }.is_unavailable());
        assert!(!CacheError::StoreNotFound("static-v1".into()).is_unavailable());
    }
}
