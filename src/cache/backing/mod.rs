//! Backing store client.
//!
//! The shared, slower tier behind the memory cache. Implementations swallow
//! connection and command failures at this boundary: reads degrade to a miss
//! and writes to a no-op, so nothing above here branches on "is Redis up".

mod noop;
mod redis_store;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

pub use self::noop::NoopStore;
pub use self::redis_store::RedisStore;

use super::config::CacheConfig;

/// Which implementation is serving the backing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingMode {
    Redis,
    Noop,
}

impl fmt::Display for BackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis => f.write_str("redis"),
            Self::Noop => f.write_str("noop"),
        }
    }
}

/// Key/value operations the cache needs from the shared tier.
///
/// Write methods return whether the store acknowledged the write. No method
/// returns an error: failures are logged by the implementation and surface
/// as a miss.
#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str) -> bool;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool;

    async fn delete(&self, key: &str) -> bool;

    /// One slot per requested key, in request order.
    async fn multi_get(&self, keys: &[String]) -> Vec<Option<String>>;

    /// Every key matching a glob pattern, enumerated incrementally.
    async fn scan_by_pattern(&self, pattern: &str) -> Vec<String>;

    fn mode(&self) -> BackingMode;
}

/// Build the backing store described by `config`.
///
/// No URL selects the no-op store. A URL that cannot be parsed is logged and
/// also falls back to no-op so startup never fails on cache configuration.
/// No connection is opened here.
pub fn from_config(config: &CacheConfig) -> Arc<dyn BackingStore> {
    let Some(url) = config
        .redis_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    else {
        info!("No Redis URL configured, backing store runs in no-op mode");
        return Arc::new(NoopStore);
    };

    match RedisStore::new(url, config.scan_count, config.max_retries) {
        Ok(store) => {
            let store = store.with_command_timeout(config.command_timeout());
            info!(
                tls = store.uses_tls(),
                timeout_ms = config.command_timeout_ms,
                "Redis backing store configured"
            );
            Arc::new(store)
        }
        Err(err) => {
            warn!(
                error = %err,
                "Invalid Redis URL, falling back to no-op backing store"
            );
            Arc::new(NoopStore)
        }
    }
}
