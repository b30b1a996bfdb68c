//! In-process backing store for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{BackingMode, BackingStore};

#[derive(Default)]
pub(crate) struct FakeStore {
    entries: Mutex<BTreeMap<String, (String, Option<Duration>)>>,
    unavailable: AtomicBool,
    multi_get_calls: AtomicUsize,
    last_batch: Mutex<Vec<String>>,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Write straight into the store, bypassing the cache.
    pub(crate) fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("fake store lock")
            .insert(key.to_string(), (value.to_string(), None));
    }

    pub(crate) fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("fake store lock")
            .get(key)
            .map(|(value, _)| value.clone())
    }

    pub(crate) fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries
            .lock()
            .expect("fake store lock")
            .get(key)
            .and_then(|(_, ttl)| *ttl)
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("fake store lock")
            .keys()
            .cloned()
            .collect()
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn multi_get_calls(&self) -> usize {
        self.multi_get_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_batch(&self) -> Vec<String> {
        self.last_batch.lock().expect("fake store lock").clone()
    }

    fn down(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        if self.down() {
            return false;
        }
        self.entries
            .lock()
            .expect("fake store lock")
            .insert(key.to_string(), (value.to_string(), ttl));
        true
    }
}

#[async_trait]
impl BackingStore for FakeStore {
    async fn get(&self, key: &str) -> Option<String> {
        if self.down() {
            return None;
        }
        self.raw(key)
    }

    async fn set(&self, key: &str, value: &str) -> bool {
        self.put(key, value, None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool {
        self.put(key, value, Some(ttl))
    }

    async fn delete(&self, key: &str) -> bool {
        if self.down() {
            return false;
        }
        self.entries.lock().expect("fake store lock").remove(key);
        true
    }

    async fn multi_get(&self, keys: &[String]) -> Vec<Option<String>> {
        self.multi_get_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_batch.lock().expect("fake store lock") = keys.to_vec();
        if self.down() {
            return vec![None; keys.len()];
        }
        keys.iter().map(|key| self.raw(key)).collect()
    }

    async fn scan_by_pattern(&self, pattern: &str) -> Vec<String> {
        if self.down() {
            return Vec::new();
        }
        let prefix = pattern.trim_end_matches('*');
        self.entries
            .lock()
            .expect("fake store lock")
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn mode(&self) -> BackingMode {
        BackingMode::Redis
    }
}
