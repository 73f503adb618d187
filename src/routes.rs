//! Route classification
//!
//! Maps an outbound request to the policy that governs it. Rules are tested
//! in table order and the first match wins, so static assets and model
//! files are claimed before the generic image rule, which in turn runs
//! before the API and HTML rules.
//!
//! A rule matches when its pattern matches either the URL path or the full
//! URL. Keyword rules (models) can therefore match on the host name alone,
//! e.g. a CDN named `models.example`.

use crate::error::{CacheError, CacheResult};
use crate::request::Request;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Store categories (names are suffixed with the version tag)
pub mod category {
    pub const STATIC: &str = "static";
    pub const MODELS: &str = "models";
    pub const IMAGES: &str = "images";
    pub const DYNAMIC: &str = "dynamic";

    /// All categories that make up the valid-store allow-list
    pub const ALL: [&str; 4] = [STATIC, MODELS, IMAGES, DYNAMIC];
}

/// Retrieval/update strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
    CacheOnly,
}

impl Strategy {
    /// Strategies that write network responses into their store
    pub fn writes_cache(&self) -> bool {
        matches!(
            self,
            Self::CacheFirst | Self::NetworkFirst | Self::StaleWhileRevalidate
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CacheFirst => "CACHE_FIRST",
            Self::NetworkFirst => "NETWORK_FIRST",
            Self::StaleWhileRevalidate => "STALE_WHILE_REVALIDATE",
            Self::NetworkOnly => "NETWORK_ONLY",
            Self::CacheOnly => "CACHE_ONLY",
        };
        write!(f, "{}", name)
    }
}

/// Policy assigned to a request category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Route name, for logs and `classify` output
    pub route: String,
    pub strategy: Strategy,
    /// Target store name (category + version tag)
    pub store: String,
    /// Entries younger than this are fresh
    pub max_age: Duration,
    /// Upper bound on entries in the store (0 = unbounded)
    pub max_entries: usize,
}

/// Which part of the URL a rule matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedOn {
    Path,
    FullUrl,
    /// No rule matched, default policy
    Default,
}

impl fmt::Display for MatchedOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::FullUrl => write!(f, "full url"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// A single entry of the route table
#[derive(Debug, Clone)]
pub struct Route {
    pattern: Regex,
    policy: RoutePolicy,
}

impl Route {
    fn new(
        name: &str,
        pattern: &str,
        strategy: Strategy,
        store: String,
        max_age: Duration,
        max_entries: usize,
    ) -> CacheResult<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| CacheError::InvalidRoute {
                route: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pattern,
            policy: RoutePolicy {
                route: name.to_string(),
                strategy,
                store,
                max_age,
                max_entries,
            },
        })
    }

    /// Test the path first, then the full URL
    fn matches(&self, request: &Request) -> Option<MatchedOn> {
        if self.pattern.is_match(request.url().path()) {
            Some(MatchedOn::Path)
        } else if self.pattern.is_match(request.url().as_str()) {
            Some(MatchedOn::FullUrl)
        } else {
            None
        }
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }
}

/// Ordered route table with a default policy
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    version: String,
    routes: Vec<Route>,
    default: RoutePolicy,
}

impl RouteClassifier {
    /// Build the standard route table for a version tag
    pub fn new(version: &str) -> CacheResult<Self> {
        let store = |category: &str| store_name(category, version);

        let routes = vec![
            Route::new(
                "static-assets",
                r"\.(css|js|png|jpg|jpeg|svg|woff2?|ttf|eot)$",
                Strategy::CacheFirst,
                store(category::STATIC),
                Duration::from_secs(7 * DAY),
                100,
            )?,
            Route::new(
                "ai-models",
                r"(models?|tfjs|tensorflow|mediapipe|face-api|onnx)",
                Strategy::CacheFirst,
                store(category::MODELS),
                Duration::from_secs(30 * DAY),
                20,
            )?,
            Route::new(
                "images",
                r"\.(jpg|jpeg|png|webp|gif)$",
                Strategy::StaleWhileRevalidate,
                store(category::IMAGES),
                Duration::from_secs(7 * DAY),
                200,
            )?,
            Route::new(
                "api",
                r"^/api/",
                Strategy::NetworkFirst,
                store(category::DYNAMIC),
                Duration::from_secs(5 * MINUTE),
                50,
            )?,
            // Shares the dynamic store with api and default; its smaller
            // bound caps that store whenever an HTML request is served
            Route::new(
                "html",
                r"(\.html?$|^/$)",
                Strategy::NetworkFirst,
                store(category::DYNAMIC),
                Duration::from_secs(DAY),
                20,
            )?,
        ];

        let default = RoutePolicy {
            route: "default".to_string(),
            strategy: Strategy::NetworkFirst,
            store: store(category::DYNAMIC),
            max_age: Duration::from_secs(5 * MINUTE),
            max_entries: 50,
        };

        Ok(Self {
            version: version.to_string(),
            routes,
            default,
        })
    }

    /// Resolve the policy for a request
    ///
    /// Returns `None` for non-GET requests, which bypass the cache.
    pub fn classify(&self, request: &Request) -> Option<&RoutePolicy> {
        self.classify_explained(request).map(|(policy, _)| policy)
    }

    /// Like `classify`, also reporting which part of the URL matched
    pub fn classify_explained(&self, request: &Request) -> Option<(&RoutePolicy, MatchedOn)> {
        if !request.method().is_cacheable() {
            return None;
        }

        for route in &self.routes {
            if let Some(on) = route.matches(request) {
                return Some((&route.policy, on));
            }
        }

        Some((&self.default, MatchedOn::Default))
    }

    /// Store names that survive activation
    pub fn valid_stores(&self) -> Vec<String> {
        category::ALL
            .iter()
            .map(|c| store_name(c, &self.version))
            .collect()
    }

    /// Name of the install-time static store
    pub fn static_store(&self) -> String {
        store_name(category::STATIC, &self.version)
    }

    /// Name of the model store
    pub fn model_store(&self) -> String {
        store_name(category::MODELS, &self.version)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn default_policy(&self) -> &RoutePolicy {
        &self.default
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Versioned store name, e.g. `static-v2`
pub fn store_name(category: &str, version: &str) -> String {
    format!("{}-{}", category, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;

    fn classifier() -> RouteClassifier {
        RouteClassifier::new("v2").unwrap()
    }

    fn classify(url: &str) -> RoutePolicy {
        let request = Request::get(url).unwrap();
        classifier().classify(&request).unwrap().clone()
    }

    #[test]
    fn static_asset_beats_image_rule() {
        let policy = classify("https://cdn.example/app/logo.png");
        assert_eq!(policy.route, "static-assets");
        assert_eq!(policy.strategy, Strategy::CacheFirst);
        assert_eq!(policy.store, "static-v2");
        assert_eq!(policy.max_entries, 100);
        assert_eq!(policy.max_age, Duration::from_secs(7 * DAY));
    }

    #[test]
    fn webp_goes_to_images() {
        let policy = classify("https://app.example/photos/cat.webp");
        assert_eq!(policy.strategy, Strategy::StaleWhileRevalidate);
        assert_eq!(policy.store, "images-v2");
        assert_eq!(policy.max_entries, 200);
    }

    #[test]
    fn model_keyword_matches_path() {
        let policy = classify("https://cdn.example/models/face/weights.bin");
        assert_eq!(policy.route, "ai-models");
        assert_eq!(policy.max_age, Duration::from_secs(30 * DAY));
        assert_eq!(policy.max_entries, 20);
    }

    #[test]
    fn model_keyword_matches_host_only() {
        let request = Request::get("https://tfjs.cdn.example/weights.bin").unwrap();
        let c = classifier();
        let (policy, on) = c.classify_explained(&request).unwrap();
        assert_eq!(policy.route, "ai-models");
        assert_eq!(on, MatchedOn::FullUrl);
    }

    #[test]
    fn api_prefix_is_network_first() {
        let policy = classify("https://app.example/api/pages?book=1");
        assert_eq!(policy.route, "api");
        assert_eq!(policy.strategy, Strategy::NetworkFirst);
        assert_eq!(policy.max_age, Duration::from_secs(5 * MINUTE));
        assert_eq!(policy.max_entries, 50);
    }

    #[test]
    fn root_and_html_pages() {
        let root = classify("https://app.example/");
        assert_eq!(root.route, "html");
        assert_eq!(root.max_age, Duration::from_secs(DAY));
        assert_eq!(root.max_entries, 20);

        let page = classify("https://app.example/gallery.html");
        assert_eq!(page.route, "html");
    }

    #[test]
    fn query_string_does_not_hide_extension() {
        let policy = classify("https://app.example/css/site.css?v=42");
        assert_eq!(policy.route, "static-assets");
    }

    #[test]
    fn unmatched_uses_default() {
        let request = Request::get("https://app.example/feed").unwrap();
        let c = classifier();
        let (policy, on) = c.classify_explained(&request).unwrap();
        assert_eq!(policy.route, "default");
        assert_eq!(policy.strategy, Strategy::NetworkFirst);
        assert_eq!(policy.store, "dynamic-v2");
        assert_eq!(policy.max_entries, 50);
        assert_eq!(on, MatchedOn::Default);
    }

    #[test]
    fn non_get_has_no_policy() {
        for method in [Method::Post, Method::Put, Method::Delete, Method::Head] {
            let request = Request::new(method, "https://app.example/api/upload").unwrap();
            assert!(classifier().classify(&request).is_none());
        }
    }

    #[test]
    fn valid_stores_follow_version() {
        let mut stores = classifier().valid_stores();
        stores.sort();
        assert_eq!(
            stores,
            vec!["dynamic-v2", "images-v2", "models-v2", "static-v2"]
        );
    }

    #[test]
    fn strategy_writes_cache() {
        assert!(Strategy::CacheFirst.writes_cache());
        assert!(Strategy::StaleWhileRevalidate.writes_cache());
        assert!(!Strategy::NetworkOnly.writes_cache());
        assert!(!Strategy::CacheOnly.writes_cache());
    }
}
