use std::time::Duration;

use async_trait::async_trait;

use super::{BackingMode, BackingStore};

/// Stand-in used when no Redis URL is configured.
///
/// Writes report success without persisting; reads always miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl BackingStore for NoopStore {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str) -> bool {
        true
    }

    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> bool {
        true
    }

    async fn delete(&self, _key: &str) -> bool {
        true
    }

    async fn multi_get(&self, keys: &[String]) -> Vec<Option<String>> {
        vec![None; keys.len()]
    }

    async fn scan_by_pattern(&self, _pattern: &str) -> Vec<String> {
        Vec::new()
    }

    fn mode(&self) -> BackingMode {
        BackingMode::Noop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_succeed_and_reads_miss() {
        let store = NoopStore;

        assert!(store.set("post:7", "{}").await);
        assert!(
            store
                .set_with_ttl("post:7", "{}", Duration::from_secs(60))
                .await
        );
        assert_eq!(store.get("post:7").await, None);
        assert_eq!(
            store.multi_get(&["post:7".to_string()]).await,
            vec![None]
        );
        assert!(store.scan_by_pattern("post:*").await.is_empty());
        assert!(store.delete("post:7").await);
    }
}
