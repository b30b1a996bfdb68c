//! Process-local memory tier.
//!
//! Every entry carries an absolute deadline no further out than the
//! configured ceiling, whatever TTL the caller asked for. Expiry is checked on
//! read; nothing sweeps in the background.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct MemoryEntry {
    payload: Arc<str>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

pub struct MemoryCache {
    entries: DashMap<String, MemoryEntry>,
    max_ttl: Duration,
}

impl MemoryCache {
    /// A zero `max_ttl` disables the tier: writes are dropped.
    pub fn new(max_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_ttl,
        }
    }

    /// Return the payload if present and not past its deadline. An expired
    /// entry is evicted on the way out.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(Arc::clone(&entry.payload)),
            Some(_) => {}
            None => return None,
        }

        // A concurrent writer may have replaced the entry since the read.
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    /// Store a payload for `min(ttl, max_ttl)`; `None` means the ceiling.
    pub fn set(&self, key: &str, payload: Arc<str>, ttl: Option<Duration>) {
        let ttl = ttl.map_or(self.max_ttl, |ttl| ttl.min(self.max_ttl));
        if ttl.is_zero() {
            return;
        }

        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Number of stored entries, expired ones included until next read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
