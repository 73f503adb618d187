//! Named response stores
//!
//! A `CacheStorage` owns a set of named `CacheStore`s, one per request
//! category. Stores are opened on demand (created if absent), persist until
//! deleted wholesale, and keep their keys in insertion order.
//!
//! # Entry ordering
//!
//! Every write is stamped with `inserted_at` and a per-store sequence
//! number. Writing an existing key replaces the entry and moves it to the
//! newest position, so `keys()` is always oldest-first by last write.

pub mod disk;
pub mod memory;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

use crate::config::schema::{CacheConfig, StorageBackend};
use crate::config::ConfigManager;
use crate::error::{CacheError, CacheResult};
use crate::request::{Response, ResponseSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A cached response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Request identity (URL without fragment)
    pub key: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Stamped by the store's writer, never taken from server headers
    pub inserted_at: DateTime<Utc>,
    /// Insertion order within the store
    pub sequence: u64,
}

impl CacheEntry {
    /// Age of the entry at `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.inserted_at
    }

    /// Fresh iff age < max_age
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => self.age(now) < max_age,
            // Larger than chrono can represent, never expires
            Err(_) => true,
        }
    }

    /// Turn the entry back into a response
    pub fn into_response(self) -> Response {
        Response {
            url: self.key,
            status: self.status,
            content_type: self.content_type,
            body: self.body,
            source: ResponseSource::Cache {
                inserted_at: self.inserted_at,
            },
        }
    }
}

/// Storage usage report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageEstimate {
    /// Bytes used
    pub usage: u64,
    /// Bytes available
    pub quota: u64,
    /// usage / quota as a percentage
    pub percentage: f64,
}

impl StorageEstimate {
    pub fn new(usage: u64, quota: u64) -> Self {
        let percentage = if quota == 0 {
            0.0
        } else {
            (usage as f64 / quota as f64) * 100.0
        };
        Self {
            usage,
            quota,
            percentage,
        }
    }
}

/// One named key -> entry mapping
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store name
    fn name(&self) -> &str;

    /// Look up an entry
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Insert or replace the entry for `key`, stamped with `inserted_at`
    async fn put(
        &self,
        key: &str,
        response: &Response,
        inserted_at: DateTime<Utc>,
    ) -> CacheResult<()>;

    /// Remove an entry, returning whether it existed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// All keys, oldest insertion first
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Total bytes held by the store
    async fn size_bytes(&self) -> CacheResult<u64>;
}

/// The set of named stores
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a store, creating it if absent
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheStore>>;

    /// Whether a store exists
    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Delete a store wholesale, returning whether it existed
    async fn delete(&self, name: &str) -> CacheResult<bool>;

    /// Names of all existing stores
    async fn names(&self) -> CacheResult<Vec<String>>;

    /// Usage/quota, or `None` when the backend cannot tell
    async fn estimate(&self) -> CacheResult<Option<StorageEstimate>>;

    /// Human-readable backend name
    fn backend_name(&self) -> &'static str;
}

/// Validate a store name before it touches a backend
pub fn validate_store_name(name: &str) -> CacheResult<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidStoreName(name.to_string()))
    }
}

/// Root directory of the disk backend
pub fn stores_root(config: &CacheConfig) -> PathBuf {
    config
        .dir
        .clone()
        .unwrap_or_else(ConfigManager::stores_dir)
}

/// Create the storage backend selected by configuration
pub async fn open_storage(config: &CacheConfig) -> CacheResult<Arc<dyn CacheStorage>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageBackend::Disk => {
            let root = stores_root(config);
            let quota = (config.quota_mb > 0).then(|| u64::from(config.quota_mb) * 1024 * 1024);
            Ok(Arc::new(DiskStorage::open(root, quota).await?))
        }
    }
}
