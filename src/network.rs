//! Network access
//!
//! Fetching sits behind the `Fetcher` trait so strategies can be driven by
//! the real HTTP client, by an always-offline fetcher, or by scripted
//! fetchers in tests.

use crate::config::schema::NetworkConfig;
use crate::error::{CacheError, CacheResult};
use crate::request::{Method, Request, Response};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Performs network requests
///
/// A `Err` means the request could not be completed at all (transport
/// failure). HTTP error statuses are returned as responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> CacheResult<Response>;
}

/// HTTP fetcher backed by a blocking `ureq` agent
///
/// Each request runs on the blocking thread pool.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_body_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &NetworkConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout_secs.map(Duration::from_secs))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            max_body_bytes: u64::from(config.max_body_mb) * 1024 * 1024,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(&NetworkConfig::default())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> CacheResult<Response> {
        let agent = self.agent.clone();
        let url = request.url().to_string();
        let method = request.method();
        let body = request.body().map(<[u8]>::to_vec).unwrap_or_default();
        let limit = self.max_body_bytes;

        debug!("Fetching {} {}", method, url);

        let target = url.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut response = match method {
                Method::Get => agent.get(&target).call(),
                Method::Head => agent.head(&target).call(),
                Method::Delete => agent.delete(&target).call(),
                Method::Options => agent.options(&target).call(),
                Method::Post => agent.post(&target).send(&body[..]),
                Method::Put => agent.put(&target).send(&body[..]),
                Method::Patch => agent.patch(&target).send(&body[..]),
            }?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = response
                .body_mut()
                .with_config()
                .limit(limit)
                .read_to_vec()?;

            Ok::<_, ureq::Error>((status, content_type, bytes))
        })
        .await
        .map_err(|e| CacheError::Internal(format!("fetch task failed: {}", e)))?;

        let (status, content_type, bytes) =
            result.map_err(|e| CacheError::network(url.clone(), e.to_string()))?;

        debug!("Fetched {} -> {} ({} bytes)", url, status, bytes.len());
        Ok(Response::from_network(url, status, content_type, bytes))
    }
}

/// A fetcher with no network: every request fails
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, request: &Request) -> CacheResult<Response> {
        Err(CacheError::network(request.key(), "offline"))
    }
}
