//! Cache strategies
//!
//! `CachePolicyExecutor` runs one of the five strategies for a request
//! against the store its policy names:
//!
//! | Strategy | Cache read | Network | Cache write |
//! |----------|------------|---------|-------------|
//! | CACHE_FIRST | fresh hit returns | on miss/stale | on success |
//! | NETWORK_FIRST | on network failure | always first | on success |
//! | STALE_WHILE_REVALIDATE | any hit returns | always, in background | on success |
//! | NETWORK_ONLY | never | always | never |
//! | CACHE_ONLY | always | never | never |
//!
//! Store I/O problems never fail a request on their own: a failed read is a
//! miss and a failed write is logged. Writes to the same key from
//! overlapping requests are not serialized; the last write to finish wins.

use crate::clock::Clock;
use crate::error::{CacheError, CacheResult};
use crate::eviction::EvictionManager;
use crate::network::Fetcher;
use crate::request::{Request, Response};
use crate::routes::{RoutePolicy, Strategy};
use crate::store::{CacheEntry, CacheStorage, CacheStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Executes route policies
#[derive(Clone)]
pub struct CachePolicyExecutor {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    eviction: EvictionManager,
}

impl CachePolicyExecutor {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let eviction = EvictionManager::new(storage.clone());
        Self {
            storage,
            fetcher,
            clock,
            eviction,
        }
    }

    /// Run the policy's strategy for `request`
    ///
    /// For strategies that write to the cache, eviction runs afterwards
    /// whatever the outcome, so stores stay bounded under partial failure.
    pub async fn execute(&self, request: &Request, policy: &RoutePolicy) -> CacheResult<Response> {
        debug!(
            "{} {} via {} ({})",
            request.method(),
            request.key(),
            policy.strategy,
            policy.store
        );

        let result = match policy.strategy {
            Strategy::CacheFirst => self.cache_first(request, &policy.store, policy.max_age).await,
            Strategy::NetworkFirst => self.network_first(request, &policy.store).await,
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(request, &policy.store, policy.max_entries)
                    .await
            }
            Strategy::NetworkOnly => self.network_only(request).await,
            Strategy::CacheOnly => self.cache_only(request, &policy.store).await,
        };

        if policy.strategy.writes_cache() {
            self.eviction.enforce(&policy.store, policy.max_entries).await;
        }

        result
    }

    /// Fresh hit returns without touching the network. Otherwise fetch and
    /// store; if the fetch fails, serve whatever is cached, stale or not.
    pub async fn cache_first(
        &self,
        request: &Request,
        store_name: &str,
        max_age: Duration,
    ) -> CacheResult<Response> {
        let cached = self.lookup(store_name, request.key()).await;

        if let Some(entry) = &cached {
            if entry.is_fresh(self.clock.now(), max_age) {
                debug!("Fresh cache hit: {}", request.key());
                return Ok(entry.clone().into_response());
            }
            debug!("Stale cache entry, revalidating: {}", request.key());
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.remember(store_name, request, &response).await;
                Ok(response)
            }
            Err(e) => match cached {
                Some(entry) => {
                    warn!("Network failed for {}, serving cached copy: {}", request.key(), e);
                    Ok(entry.into_response())
                }
                None => Err(e),
            },
        }
    }

    /// Network first; on failure fall back to any cached copy.
    pub async fn network_first(&self, request: &Request, store_name: &str) -> CacheResult<Response> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.remember(store_name, request, &response).await;
                Ok(response)
            }
            Err(e) => match self.lookup(store_name, request.key()).await {
                Some(entry) => {
                    warn!("Network failed for {}, serving cached copy: {}", request.key(), e);
                    Ok(entry.into_response())
                }
                None => Err(e),
            },
        }
    }

    /// Any cached copy returns immediately while a background fetch
    /// refreshes the store. With nothing cached, wait for that fetch.
    pub async fn stale_while_revalidate(
        &self,
        request: &Request,
        store_name: &str,
        max_entries: usize,
    ) -> CacheResult<Response> {
        let cached = self.lookup(store_name, request.key()).await;

        let revalidation = {
            let executor = self.clone();
            let request = request.clone();
            let store_name = store_name.to_string();
            tokio::spawn(async move {
                executor
                    .revalidate(&request, &store_name, max_entries)
                    .await
            })
        };

        match cached {
            Some(entry) => {
                debug!("Serving cached copy while revalidating: {}", request.key());
                Ok(entry.into_response())
            }
            None => revalidation
                .await
                .map_err(|e| CacheError::Internal(format!("revalidation task failed: {}", e)))?,
        }
    }

    /// Background half of stale-while-revalidate. Failures are logged here
    /// and only reach a caller that is waiting on the result.
    async fn revalidate(
        &self,
        request: &Request,
        store_name: &str,
        max_entries: usize,
    ) -> CacheResult<Response> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if self.remember(store_name, request, &response).await {
                    self.eviction.enforce(store_name, max_entries).await;
                }
                Ok(response)
            }
            Err(e) => {
                warn!("Background revalidation failed for {}: {}", request.key(), e);
                Err(e)
            }
        }
    }

    /// Straight to the network, no store involved.
    pub async fn network_only(&self, request: &Request) -> CacheResult<Response> {
        self.fetcher.fetch(request).await
    }

    /// Cached copy or an explicit "not cached" failure; never the network.
    pub async fn cache_only(&self, request: &Request, store_name: &str) -> CacheResult<Response> {
        match self.lookup(store_name, request.key()).await {
            Some(entry) => Ok(entry.into_response()),
            None => Err(CacheError::NotCached {
                url: request.key().to_string(),
            }),
        }
    }

    /// Open a store for writing, creating it on first use
    async fn open_store(&self, name: &str) -> Option<Arc<dyn CacheStore>> {
        match self.storage.open(name).await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Cannot open store {}: {}", name, e);
                None
            }
        }
    }

    /// Open a store only if it already exists; reads never create stores
    async fn existing_store(&self, name: &str) -> Option<Arc<dyn CacheStore>> {
        match self.storage.has(name).await {
            Ok(true) => self.open_store(name).await,
            Ok(false) => None,
            Err(e) => {
                warn!("Cannot check store {}: {}", name, e);
                None
            }
        }
    }

    async fn lookup(&self, store_name: &str, key: &str) -> Option<CacheEntry> {
        let store = self.existing_store(store_name).await?;
        match store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read failed in {} for {}: {}", store.name(), key, e);
                None
            }
        }
    }

    /// Write a successful response, stamping it with the current time.
    /// Returns whether anything was written.
    async fn remember(
        &self,
        store_name: &str,
        request: &Request,
        response: &Response,
    ) -> bool {
        if !response.is_ok() {
            debug!("Not caching {} (status {})", request.key(), response.status);
            return false;
        }
        let Some(store) = self.open_store(store_name).await else {
            return false;
        };

        match store.put(request.key(), response, self.clock.now()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache write failed in {} for {}: {}", store.name(), request.key(), e);
                false
            }
        }
    }
}
