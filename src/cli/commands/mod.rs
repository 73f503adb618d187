//! CLI command implementations

pub mod classify;
pub mod config;
pub mod fetch;
pub mod install;
pub mod message;
pub mod status;
pub mod stores;

pub use classify::execute as classify;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use message::{execute as message, prefetch, usage};
pub use status::execute as status;
pub use stores::execute as stores;

use crate::config::Config;
use crate::error::CacheResult;
use crate::lifecycle::LifecycleController;
use crate::network::{Fetcher, HttpFetcher, OfflineFetcher};
use std::sync::Arc;
use std::time::Duration;

/// Controller over the configured stores
///
/// `offline` swaps the HTTP client for a fetcher that always fails.
pub(crate) async fn controller(config: &Config, offline: bool) -> CacheResult<LifecycleController> {
    let fetcher: Arc<dyn Fetcher> = if offline {
        Arc::new(OfflineFetcher)
    } else {
        Arc::new(HttpFetcher::new(&config.network))
    };
    LifecycleController::from_config(config, fetcher).await
}

/// Compact human duration, e.g. `7d`, `24h`, `5m`
pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        s if s >= 86_400 && s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s >= 3_600 && s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s >= 60 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

/// Byte count with a binary unit
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_secs(7 * 86_400)), "7d");
        assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
    }

    #[test]
    fn bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
