//! Request and response descriptors
//!
//! A `Request` is immutable once built. Its cache key is the URL with any
//! fragment removed, so `page.html#top` and `page.html` share one entry.

use crate::error::{CacheError, CacheResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Only GET is eligible for caching
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Method {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(CacheError::InvalidMethod(s.to_string())),
        }
    }
}

/// What the requester intends to do with the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    #[default]
    Other,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Script => "script",
            Self::Style => "style",
            Self::Font => "font",
            Self::Other => "other",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Destination {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            "script" => Ok(Self::Script),
            "style" => Ok(Self::Style),
            "font" => Ok(Self::Font),
            "other" | "" => Ok(Self::Other),
            other => Err(CacheError::User(format!(
                "Unknown destination '{}'. Valid: document, image, script, style, font, other",
                other
            ))),
        }
    }
}

/// Outbound request descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
    key: String,
    method: Method,
    destination: Destination,
    body: Option<Vec<u8>>,
}

impl Request {
    /// Create a request for an absolute URL
    pub fn new(method: Method, url: &str) -> CacheResult<Self> {
        let url = Url::parse(url).map_err(|e| CacheError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_url(method, url))
    }

    /// Shorthand for a GET request
    pub fn get(url: &str) -> CacheResult<Self> {
        Self::new(Method::Get, url)
    }

    /// Resolve `target` against `base` (absolute targets are kept as-is)
    pub fn resolve(base: &str, target: &str) -> CacheResult<Self> {
        let base_url = Url::parse(base).map_err(|e| CacheError::InvalidUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        let url = base_url.join(target).map_err(|e| CacheError::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_url(Method::Get, url))
    }

    fn from_url(method: Method, url: Url) -> Self {
        let mut keyed = url.clone();
        keyed.set_fragment(None);
        Self {
            key: keyed.to_string(),
            url,
            method,
            destination: Destination::Other,
            body: None,
        }
    }

    /// Set the destination hint
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Attach a request body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Cache identity of this request
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Whether the URL scheme is http or https
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache { inserted_at: DateTime<Utc> },
    Fallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Cache { inserted_at } => write!(f, "cache ({})", inserted_at.to_rfc3339()),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Response handed back to the hosting application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl Response {
    /// A response that arrived from the network
    pub fn from_network(
        url: impl Into<String>,
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            content_type,
            body,
            source: ResponseSource::Network,
        }
    }

    /// Status in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn from_cache(&self) -> bool {
        matches!(self.source, ResponseSource::Cache { .. })
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ResponseSource::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_and_display() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn only_get_is_cacheable() {
        assert!(Method::Get.is_cacheable());
        for method in [Method::Head, Method::Post, Method::Put, Method::Delete] {
            assert!(!method.is_cacheable());
        }
    }

    #[test]
    fn key_strips_fragment() {
        let req = Request::get("https://app.example/book.html#page-3").unwrap();
        assert_eq!(req.key(), "https://app.example/book.html");
        assert_eq!(req.url().fragment(), Some("page-3"));
    }

    #[test]
    fn resolve_relative_against_origin() {
        let req = Request::resolve("http://localhost:8080", "/js/app.js").unwrap();
        assert_eq!(req.key(), "http://localhost:8080/js/app.js");

        let abs = Request::resolve("http://localhost:8080", "https://cdn.example/three.min.js")
            .unwrap();
        assert_eq!(abs.key(), "https://cdn.example/three.min.js");
    }

    #[test]
    fn invalid_url_rejected() {
        let err = Request::get("not a url").unwrap_err();
        assert!(matches!(err, CacheError::InvalidUrl { .. }));
    }

    #[test]
    fn http_scheme_detection() {
        assert!(Request::get("http://a.example/").unwrap().is_http());
        assert!(!Request::get("data:text/plain,hi").unwrap().is_http());
    }

    #[test]
    fn response_ok_range() {
        let ok = Response::from_network("u", 204, None, vec![]);
        let missing = Response::from_network("u", 404, None, vec![]);
        assert!(ok.is_ok());
        assert!(!missing.is_ok());
    }
}
