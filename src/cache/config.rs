//! Cache configuration.
//!
//! Controls the memory tier, the Redis backing store and the list views via
//! the `[cache]` table of `quire.toml`.

use std::time::Duration;

const DEFAULT_ENTITY_TTL_SECS: u64 = 3600;
const DEFAULT_L1_MAX_TTL_SECS: u64 = 60;
const DEFAULT_INDEX_TTL_SECS: u64 = 30;
const DEFAULT_INDEX_PAGE_SIZE: usize = 50;
const DEFAULT_SCAN_COUNT: usize = 200;
const DEFAULT_MAX_RETRIES: usize = 2;
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 500;

/// Cache configuration, resolved from the `[cache]` settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection string. `None` runs the backing tier in no-op mode.
    pub redis_url: Option<String>,
    /// TTL for per-post entries in the backing store.
    pub entity_ttl_seconds: u64,
    /// Ceiling applied to every memory-tier entry.
    pub l1_max_ttl_seconds: u64,
    /// TTL for cached list views.
    pub index_ttl_seconds: u64,
    /// Maximum posts returned by a list view.
    pub index_page_size: usize,
    /// `COUNT` hint passed to each `SCAN` round trip.
    pub scan_count: usize,
    /// Reconnect attempts per command before giving up.
    pub max_retries: usize,
    /// Bound on connecting to Redis and on waiting for each reply.
    pub command_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            entity_ttl_seconds: DEFAULT_ENTITY_TTL_SECS,
            l1_max_ttl_seconds: DEFAULT_L1_MAX_TTL_SECS,
            index_ttl_seconds: DEFAULT_INDEX_TTL_SECS,
            index_page_size: DEFAULT_INDEX_PAGE_SIZE,
            scan_count: DEFAULT_SCAN_COUNT,
            max_retries: DEFAULT_MAX_RETRIES,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            redis_url: settings.redis_url.clone(),
            entity_ttl_seconds: settings.entity_ttl.as_secs(),
            l1_max_ttl_seconds: settings.l1_max_ttl.as_secs(),
            index_ttl_seconds: settings.index_ttl.as_secs(),
            index_page_size: settings.index_page_size.get() as usize,
            scan_count: settings.scan_count.get() as usize,
            max_retries: settings.max_retries as usize,
            command_timeout_ms: settings.command_timeout.as_millis() as u64,
        }
    }
}

impl CacheConfig {
    pub fn entity_ttl(&self) -> Duration {
        Duration::from_secs(self.entity_ttl_seconds)
    }

    pub fn l1_max_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_max_ttl_seconds)
    }

    pub fn index_ttl(&self) -> Duration {
        Duration::from_secs(self.index_ttl_seconds)
    }

    /// Page size, clamped to at least one post.
    pub fn index_page_size(&self) -> usize {
        self.index_page_size.max(1)
    }

    /// Per-command bound, at least one millisecond.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.redis_url.is_none());
        assert_eq!(config.entity_ttl(), Duration::from_secs(3600));
        assert_eq!(config.l1_max_ttl(), Duration::from_secs(60));
        assert_eq!(config.index_ttl(), Duration::from_secs(30));
        assert_eq!(config.index_page_size, 50);
        assert_eq!(config.scan_count, 200);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.command_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn page_size_clamps_to_one() {
        let config = CacheConfig {
            index_page_size: 0,
            ..Default::default()
        };
        assert_eq!(config.index_page_size(), 1);
    }

    #[test]
    fn command_timeout_never_zero() {
        let config = CacheConfig {
            command_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.command_timeout(), Duration::from_millis(1));
    }
}
