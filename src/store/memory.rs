//! In-process storage backend
//!
//! Lives as long as the `MemoryStorage` value. Used for tests and for
//! `backend = "memory"` runs where nothing should touch the disk.

use super::{validate_store_name, CacheEntry, CacheStorage, CacheStore, StorageEstimate};
use crate::error::CacheResult;
use crate::request::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
}

/// A single in-memory store
pub struct MemoryStore {
    name: String,
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(StoreInner::default()),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(self.inner.lock().await.entries.get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        response: &Response,
        inserted_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        let mut inner = self.inner.lock().await;
        inner.next_sequence += 1;
        let entry = CacheEntry {
            key: key.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
            body: response.body.clone(),
            inserted_at,
            sequence: inner.next_sequence,
        };
        inner.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.inner.lock().await.entries.remove(key).is_some())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<&CacheEntry> = inner.entries.values().collect();
        entries.sort_by_key(|e| e.sequence);
        Ok(entries.into_iter().map(|e| e.key.clone()).collect())
    }

    async fn size_bytes(&self) -> CacheResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.entries.values().map(|e| e.body.len() as u64).sum())
    }
}

/// Storage holding every store in memory
#[derive(Default)]
pub struct MemoryStorage {
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheStore>> {
        validate_store_name(name)?;
        let mut stores = self.stores.lock().await;
        let store = stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new(name)))
            .clone();
        Ok(store)
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.stores.lock().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        Ok(self.stores.lock().await.remove(name).is_some())
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        let mut names: Vec<String> = self.stores.lock().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn estimate(&self) -> CacheResult<Option<StorageEstimate>> {
        Ok(None)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
