//! Store size bounds
//!
//! Trims a store to its `max_entries` bound by deleting the oldest keys
//! (insertion order, no access tracking). Runs right after writes but is
//! not transactional with them, so a concurrent reader may briefly see a
//! store over its bound.

use crate::error::CacheResult;
use crate::store::CacheStorage;
use std::sync::Arc;
use tracing::{debug, warn};

/// Enforces per-store entry limits
#[derive(Clone)]
pub struct EvictionManager {
    storage: Arc<dyn CacheStorage>,
}

impl EvictionManager {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    /// Trim `store_name` to at most `max_entries` entries
    ///
    /// Returns the number of entries evicted. Store I/O errors are logged
    /// and reported as zero evictions; they never reach the caller.
    pub async fn enforce(&self, store_name: &str, max_entries: usize) -> usize {
        if max_entries == 0 {
            return 0;
        }

        match self.try_enforce(store_name, max_entries).await {
            Ok(evicted) => evicted,
            Err(e) => {
                warn!("Eviction failed for {}: {}", store_name, e);
                0
            }
        }
    }

    async fn try_enforce(&self, store_name: &str, max_entries: usize) -> CacheResult<usize> {
        // Don't resurrect a store that was deleted in the meantime
        if !self.storage.has(store_name).await? {
            return Ok(0);
        }

        let store = self.storage.open(store_name).await?;
        let keys = store.keys().await?;
        if keys.len() <= max_entries {
            return Ok(0);
        }

        let excess = keys.len() - max_entries;
        let mut evicted = 0;
        for key in keys.iter().take(excess) {
            if store.delete(key).await? {
                evicted += 1;
            }
        }

        debug!(
            "Evicted {} of {} entries from {} (limit {})",
            evicted,
            keys.len(),
            store_name,
            max_entries
        );
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Response;
    use crate::store::MemoryStorage;
    use chrono::Utc;

    async fn filled(keys: &[&str]) -> Arc<dyn CacheStorage> {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let store = storage.open("dynamic-v1").await.unwrap();
        for key in keys {
            let response = Response::from_network(*key, 200, None, vec![1]);
            store.put(key, &response, Utc::now()).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn keeps_newest_entries() {
        let storage = filled(&["a", "b", "c", "d", "e"]).await;
        let eviction = EvictionManager::new(storage.clone());

        assert_eq!(eviction.enforce("dynamic-v1", 3).await, 2);

        let store = storage.open("dynamic-v1").await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["c", "d", "e"]);
    }

    #[tokio::test]
    async fn zero_limit_is_noop() {
        let storage = filled(&["a", "b"]).await;
        let eviction = EvictionManager::new(storage.clone());

        assert_eq!(eviction.enforce("dynamic-v1", 0).await, 0);
        let store = storage.open("dynamic-v1").await.unwrap();
        assert_eq!(store.keys().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn idempotent() {
        let storage = filled(&["a", "b", "c"]).await;
        let eviction = EvictionManager::new(storage.clone());

        assert_eq!(eviction.enforce("dynamic-v1", 2).await, 1);
        assert_eq!(eviction.enforce("dynamic-v1", 2).await, 0);
    }

    #[tokio::test]
    async fn missing_store_is_not_created() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let eviction = EvictionManager::new(storage.clone());

        assert_eq!(eviction.enforce("images-v1", 10).await, 0);
        assert!(!storage.has("images-v1").await.unwrap());
    }
}
