//! flipcache - offline asset cache manager
//!
//! Intercepts outbound requests, classifies them by route, serves them
//! through one of five cache strategies against versioned stores, keeps
//! those stores bounded, and synthesizes fallbacks when both network and
//! cache fail.

pub mod cli;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod eviction;
pub mod fallback;
pub mod journal;
pub mod lifecycle;
pub mod message;
pub mod network;
pub mod request;
pub mod routes;
pub mod store;
pub mod strategy;
pub mod ui;

pub use error::{CacheError, CacheResult};
pub use lifecycle::LifecycleController;
