//! Configuration schema for flipcache
//!
//! Configuration is stored at `~/.config/flipcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Store settings
    pub cache: CacheConfig,

    /// Network client settings
    pub network: NetworkConfig,

    /// Install-time pre-population
    pub install: InstallConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Record lifecycle events in the journal
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// Where stores live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory per store, survives restarts
    Disk,
    /// Process memory only
    Memory,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Version tag appended to every store name. Bumping it makes the next
    /// activation purge all stores of the previous version.
    pub version: String,

    /// Base URL that relative manifest entries resolve against
    pub origin: String,

    /// Storage backend
    pub backend: StorageBackend,

    /// Store root directory (default: state dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Quota reported by storage usage queries, in MB (0 = not reported)
    pub quota_mb: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            origin: "http://localhost:8080".to_string(),
            backend: StorageBackend::Disk,
            dir: None,
            quota_mb: 512,
        }
    }
}

/// Network client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Overall request timeout in seconds (unset = transport default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Largest response body read, in MB
    pub max_body_mb: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_body_mb: 64,
        }
    }
}

/// Install-time configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Required URLs. Install fails unless every one is fetched.
    pub manifest: Vec<String>,

    /// Model URLs pre-fetched best-effort
    pub models: Vec<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/css/styles.css".to_string(),
                "/js/app.js".to_string(),
                "/js/book.js".to_string(),
                "/js/filters.js".to_string(),
                "/manifest.json".to_string(),
                "https://cdnjs.cloudflare.com/ajax/libs/three.js/r128/three.min.js".to_string(),
                "https://cdn.jsdelivr.net/npm/@tensorflow/tfjs@4.10.0/dist/tf.min.js".to_string(),
            ],
            models: vec![
                "https://cdn.jsdelivr.net/npm/@vladmandic/face-api/model/tiny_face_detector_model-weights_manifest.json".to_string(),
                "https://cdn.jsdelivr.net/npm/@vladmandic/face-api/model/face_landmark_68_model-weights_manifest.json".to_string(),
                "https://tfhub.dev/intel/midas/v2_1_small/1/lite/1/model.json".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("backend = \"disk\""));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.version, "v1");
        assert_eq!(config.cache.backend, StorageBackend::Disk);
        assert!(!config.install.manifest.is_empty());
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [cache]
            version = "v2"
            backend = "memory"

            [install]
            manifest = ["/index.html"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.version, "v2");
        assert_eq!(config.cache.backend, StorageBackend::Memory);
        assert_eq!(config.install.manifest, vec!["/index.html"]);
        // defaults preserved
        assert_eq!(config.cache.origin, "http://localhost:8080");
        assert!(!config.install.models.is_empty());
    }
}
