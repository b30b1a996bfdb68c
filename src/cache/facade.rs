//! Read-through / write-through facade over the memory and backing tiers.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::backing::{BackingMode, BackingStore};
use super::config::CacheConfig;
use super::error::CacheError;
use super::memory::MemoryCache;

const METRIC_L1_HIT_TOTAL: &str = "quire_cache_l1_hit_total";
const METRIC_L1_MISS_TOTAL: &str = "quire_cache_l1_miss_total";
const METRIC_BACKING_HIT_TOTAL: &str = "quire_cache_backing_hit_total";
const METRIC_BACKING_MISS_TOTAL: &str = "quire_cache_backing_miss_total";
const METRIC_CORRUPT_TOTAL: &str = "quire_cache_corrupt_total";

/// The one cache surface request handlers talk to.
///
/// Reads check memory, then the backing store, promoting backing hits into
/// memory with the bounded TTL. Writes replace the value in both tiers with
/// no coordination: the last writer wins.
pub struct TieredCache {
    memory: MemoryCache,
    backing: Arc<dyn BackingStore>,
}

impl TieredCache {
    pub fn new(config: &CacheConfig, backing: Arc<dyn BackingStore>) -> Self {
        Self {
            memory: MemoryCache::new(config.l1_max_ttl()),
            backing,
        }
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn backing_mode(&self) -> BackingMode {
        self.backing.mode()
    }

    /// Fetch and decode a value, or `None` when absent from both tiers or
    /// undecodable. A memory payload that does not decode as `T` counts as a
    /// memory miss; a backing-store value that does not decode is deleted.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(value) = self.memory_hit(key) {
            counter!(METRIC_L1_HIT_TOTAL).increment(1);
            return Some(value);
        }
        counter!(METRIC_L1_MISS_TOTAL).increment(1);

        let Some(payload) = self.backing.get(key).await else {
            counter!(METRIC_BACKING_MISS_TOTAL).increment(1);
            debug!(key, "cache miss");
            return None;
        };

        match serde_json::from_str(&payload) {
            Ok(value) => {
                counter!(METRIC_BACKING_HIT_TOTAL).increment(1);
                self.memory.set(key, Arc::from(payload), None);
                Some(value)
            }
            Err(err) => {
                self.discard_corrupt(key, &err).await;
                None
            }
        }
    }

    /// Serialize once and write both tiers. The memory copy is bounded by the
    /// tier ceiling; the backing copy gets the full `ttl`, or no expiry when
    /// `ttl` is `None` or zero.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(value).map_err(|err| CacheError::serialize(key, err))?;
        let ttl = ttl.filter(|ttl| !ttl.is_zero());

        self.memory.set(key, Arc::from(payload.as_str()), ttl);

        let stored = match ttl {
            Some(ttl) => self.backing.set_with_ttl(key, &payload, ttl).await,
            None => self.backing.set(key, &payload).await,
        };
        if !stored {
            debug!(key, "Backing store did not take the write");
        }

        Ok(())
    }

    /// Batch read. Memory hits are served in place; the misses go to the
    /// backing store in one multi-get. The result has one slot per input key,
    /// in input order.
    pub async fn get_json_many<T: DeserializeOwned>(&self, keys: &[String]) -> Vec<Option<T>> {
        let mut results: Vec<Option<T>> = Vec::with_capacity(keys.len());
        let mut missing: Vec<usize> = Vec::new();

        for (index, key) in keys.iter().enumerate() {
            match self.memory_hit(key) {
                Some(value) => {
                    counter!(METRIC_L1_HIT_TOTAL).increment(1);
                    results.push(Some(value));
                }
                None => {
                    counter!(METRIC_L1_MISS_TOTAL).increment(1);
                    results.push(None);
                    missing.push(index);
                }
            }
        }

        if missing.is_empty() {
            return results;
        }

        let miss_keys: Vec<String> = missing.iter().map(|&index| keys[index].clone()).collect();
        let payloads = self.backing.multi_get(&miss_keys).await;

        for (index, payload) in missing.into_iter().zip(payloads) {
            let key = &keys[index];
            let Some(payload) = payload else {
                counter!(METRIC_BACKING_MISS_TOTAL).increment(1);
                continue;
            };
            match serde_json::from_str(&payload) {
                Ok(value) => {
                    counter!(METRIC_BACKING_HIT_TOTAL).increment(1);
                    self.memory.set(key, Arc::from(payload), None);
                    results[index] = Some(value);
                }
                Err(err) => self.discard_corrupt(key, &err).await,
            }
        }

        results
    }

    /// Keys in the backing store matching a glob pattern.
    pub async fn scan_keys(&self, pattern: &str) -> Vec<String> {
        self.backing.scan_by_pattern(pattern).await
    }

    /// Delete from the backing store only. The memory copy, if any, runs out
    /// its bounded TTL.
    pub async fn delete(&self, key: &str) -> bool {
        self.backing.delete(key).await
    }

    fn memory_hit<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.memory.get(key)?;
        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(key, error = %err, "Memory-tier payload did not decode, reading backing store");
                None
            }
        }
    }

    async fn discard_corrupt(&self, key: &str, err: &serde_json::Error) {
        counter!(METRIC_CORRUPT_TOTAL).increment(1);
        warn!(key, error = %err, "Discarding corrupt cache entry");
        if !self.backing.delete(key).await {
            debug!(key, "Corrupt entry could not be deleted");
        }
    }
}
