//! Offline substitutes
//!
//! Used when neither the network nor the cache can answer a request.
//! Documents get the cached app shell if one was installed, otherwise an
//! inline offline page. Images always get an inline placeholder. Anything
//! else fails with `CacheError::Offline`.

use crate::error::{CacheError, CacheResult};
use crate::request::{Destination, Request, Response, ResponseSource};
use crate::store::CacheStorage;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shell entries tried, in order, for offline documents
const SHELL_PATHS: [&str; 2] = ["/index.html", "/"];

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
body { font-family: system-ui, sans-serif; display: flex; align-items: center;
       justify-content: center; min-height: 100vh; margin: 0; background: #1b1b1f; color: #eee; }
main { text-align: center; max-width: 28rem; padding: 2rem; }
</style>
</head>
<body>
<main>
<h1>You're offline</h1>
<p>This page isn't available without a connection. Pages you've already opened are still in your book.</p>
</main>
</body>
</html>
"#;

const PLACEHOLDER_IMAGE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300">
<rect width="400" height="300" fill="#2a2a30"/>
<path d="M150 190l35-45 30 35 20-25 40 35z" fill="#55555f"/>
<circle cx="245" cy="120" r="14" fill="#55555f"/>
<text x="200" y="240" font-family="sans-serif" font-size="16" fill="#8a8a96" text-anchor="middle">Image unavailable offline</text>
</svg>
"##;

/// Synthesizes responses for requests nothing else could satisfy
#[derive(Clone)]
pub struct FallbackProvider {
    storage: Arc<dyn CacheStorage>,
    static_store: String,
}

impl FallbackProvider {
    pub fn new(storage: Arc<dyn CacheStorage>, static_store: impl Into<String>) -> Self {
        Self {
            storage,
            static_store: static_store.into(),
        }
    }

    /// Substitute response for `request`
    ///
    /// Only fails for destinations other than document and image.
    pub async fn provide(&self, request: &Request) -> CacheResult<Response> {
        match request.destination() {
            Destination::Document => {
                if let Some(shell) = self.cached_shell(request).await {
                    debug!("Serving cached app shell for {}", request.key());
                    return Ok(shell);
                }
                debug!("Serving offline page for {}", request.key());
                Ok(offline_page(request))
            }
            Destination::Image => {
                debug!("Serving placeholder image for {}", request.key());
                Ok(placeholder_image(request))
            }
            _ => Err(CacheError::Offline {
                url: request.key().to_string(),
            }),
        }
    }

    /// Installed index page from the static store, if any
    async fn cached_shell(&self, request: &Request) -> Option<Response> {
        match self.storage.has(&self.static_store).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!("Cannot check store {}: {}", self.static_store, e);
                return None;
            }
        }

        let store = match self.storage.open(&self.static_store).await {
            Ok(store) => store,
            Err(e) => {
                warn!("Cannot open store {}: {}", self.static_store, e);
                return None;
            }
        };

        for path in SHELL_PATHS {
            let Ok(candidate) = request.url().join(path) else {
                continue;
            };
            match store.get(candidate.as_str()).await {
                Ok(Some(entry)) => return Some(entry.into_response()),
                Ok(None) => {}
                Err(e) => warn!("Cannot read {} from {}: {}", candidate, self.static_store, e),
            }
        }
        None
    }
}

/// Inline offline HTML page
pub fn offline_page(request: &Request) -> Response {
    Response {
        url: request.key().to_string(),
        status: 503,
        content_type: Some("text/html; charset=utf-8".to_string()),
        body: OFFLINE_PAGE.as_bytes().to_vec(),
        source: ResponseSource::Fallback,
    }
}

/// Inline placeholder graphic
pub fn placeholder_image(request: &Request) -> Response {
    Response {
        url: request.key().to_string(),
        status: 200,
        content_type: Some("image/svg+xml".to_string()),
        body: PLACEHOLDER_IMAGE.as_bytes().to_vec(),
        source: ResponseSource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use chrono::Utc;

    fn provider() -> (FallbackProvider, Arc<dyn CacheStorage>) {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        (FallbackProvider::new(storage.clone(), "static-v1"), storage)
    }

    #[tokio::test]
    async fn document_uses_cached_shell() {
        let (fallback, storage) = provider();
        let store = storage.open("static-v1").await.unwrap();
        let shell = Response::from_network("", 200, None, b"<html>shell</html>".to_vec());
        store
            .put("https://app.example/index.html", &shell, Utc::now())
            .await
            .unwrap();

        let request = Request::get("https://app.example/book/42")
            .unwrap()
            .with_destination(Destination::Document);
        let response = fallback.provide(&request).await.unwrap();

        assert_eq!(response.body, b"<html>shell</html>");
        assert!(response.from_cache());
    }

    #[tokio::test]
    async fn document_without_shell_gets_offline_page() {
        let (fallback, storage) = provider();
        let request = Request::get("https://app.example/book/42")
            .unwrap()
            .with_destination(Destination::Document);
        let response = fallback.provide(&request).await.unwrap();

        assert!(response.is_fallback());
        assert_eq!(response.status, 503);
        assert!(String::from_utf8_lossy(&response.body).contains("offline"));
        // Looking for the shell must not create the store
        assert!(!storage.has("static-v1").await.unwrap());
    }

    #[tokio::test]
    async fn image_gets_placeholder() {
        let (fallback, _storage) = provider();
        let request = Request::get("https://app.example/photos/cat.webp")
            .unwrap()
            .with_destination(Destination::Image);
        let response = fallback.provide(&request).await.unwrap();

        assert!(response.is_fallback());
        assert_eq!(response.content_type.as_deref(), Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn other_destinations_fail() {
        let (fallback, _storage) = provider();
        let request = Request::get("https://app.example/api/pages")
            .unwrap()
            .with_destination(Destination::Script);
        let err = fallback.provide(&request).await.unwrap_err();
        assert!(matches!(err, CacheError::Offline { .. }));
    }
}
