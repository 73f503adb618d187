//! Configuration management for flipcache

pub mod schema;

pub use schema::Config;

use crate::error::{CacheError, CacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flipcache")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flipcache")
    }

    /// Default root for disk stores
    pub fn stores_dir() -> PathBuf {
        Self::state_dir().join("stores")
    }

    /// Get the journal path
    pub fn journal_path() -> PathBuf {
        Self::state_dir().join("journal.log")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> CacheResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> CacheResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| CacheError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| CacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        validate(path, &config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> CacheResult<()> {
        validate(&self.config_path, config)?;
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            CacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> CacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Reject values that would break store naming or manifest resolution
///
/// The version tag ends up in every store name, and under the disk
/// backend in a directory name. Relative manifest entries resolve
/// against the origin.
fn validate(path: &Path, config: &Config) -> CacheResult<()> {
    let invalid = |reason: String| CacheError::ConfigInvalid {
        path: path.to_path_buf(),
        reason,
    };

    let version = &config.cache.version;
    let tag_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if version.is_empty() || !version.chars().all(tag_char) {
        return Err(invalid(format!(
            "cache.version {:?} may only use letters, digits, '.', '_' and '-'",
            version
        )));
    }

    match Url::parse(&config.cache.origin) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => {
            return Err(invalid(format!(
                "cache.origin must be http or https, not {}",
                url.scheme()
            )))
        }
        Err(e) => {
            return Err(invalid(format!(
                "cache.origin {:?}: {}",
                config.cache.origin, e
            )))
        }
    }

    if !matches!(config.general.log_format.as_str(), "text" | "json") {
        return Err(invalid(format!(
            "general.log_format {:?} must be \"text\" or \"json\"",
            config.general.log_format
        )));
    }

    Ok(())
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
