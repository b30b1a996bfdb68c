//! Write hooks fired by the content store after a mutation commits.
//!
//! A hook never fails from the caller's point of view. Whatever goes wrong is
//! logged and reported in the returned [`HookEvent`]; the committed write
//! stands either way.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::facade::TieredCache;
use super::keys::CacheKey;
use crate::domain::posts::{PostDocument, PostId};

/// Monotonic per-process sequence number for hook events.
pub type Epoch = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookKind {
    /// A post was created or updated.
    PostWritten { post_id: Option<PostId> },
    /// A post was deleted.
    PostDeleted { post_id: PostId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// The cache now reflects the mutation.
    Applied,
    /// The backing store did not take the change; memory or TTL will catch up.
    Degraded,
    /// Nothing could be done, e.g. a written document without an id.
    Skipped { reason: String },
}

/// Record of one hook invocation.
#[derive(Debug, Clone)]
pub struct HookEvent {
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: HookKind,
    pub outcome: HookOutcome,
    pub timestamp: OffsetDateTime,
}

pub struct CacheHooks {
    cache: Arc<TieredCache>,
    entity_ttl: Duration,
    epoch_counter: AtomicU64,
}

impl CacheHooks {
    pub fn new(cache: Arc<TieredCache>, entity_ttl: Duration) -> Self {
        Self {
            cache,
            entity_ttl,
            epoch_counter: AtomicU64::new(0),
        }
    }

    /// Replace the cached copy of a post with the full committed document.
    pub async fn on_entity_written(&self, document: &PostDocument) -> HookEvent {
        let post_id = document.id();
        let kind = HookKind::PostWritten { post_id };

        let Some(id) = post_id else {
            return self.finish(
                kind,
                HookOutcome::Skipped {
                    reason: "document has no usable id".to_string(),
                },
            );
        };

        let key = CacheKey::Post(id).render();
        let outcome = match self
            .cache
            .set_json(&key, document, Some(self.entity_ttl))
            .await
        {
            Ok(()) => HookOutcome::Applied,
            Err(err) => HookOutcome::Skipped {
                reason: err.to_string(),
            },
        };

        self.finish(kind, outcome)
    }

    /// Drop the post from the backing store. The memory copy expires on its
    /// own within the tier ceiling.
    pub async fn on_entity_deleted(&self, post_id: PostId) -> HookEvent {
        let key = CacheKey::Post(post_id).render();
        let outcome = if self.cache.delete(&key).await {
            HookOutcome::Applied
        } else {
            HookOutcome::Degraded
        };

        self.finish(HookKind::PostDeleted { post_id }, outcome)
    }

    fn finish(&self, kind: HookKind, outcome: HookOutcome) -> HookEvent {
        let event = HookEvent {
            id: Uuid::new_v4(),
            epoch: self.epoch_counter.fetch_add(1, Ordering::SeqCst),
            kind,
            outcome,
            timestamp: OffsetDateTime::now_utc(),
        };

        match &event.outcome {
            HookOutcome::Applied => info!(
                event_id = %event.id,
                event_epoch = event.epoch,
                event_kind = ?event.kind,
                "Cache hook applied"
            ),
            HookOutcome::Degraded => warn!(
                event_id = %event.id,
                event_epoch = event.epoch,
                event_kind = ?event.kind,
                "Cache hook degraded: backing store unavailable"
            ),
            HookOutcome::Skipped { reason } => warn!(
                event_id = %event.id,
                event_epoch = event.epoch,
                event_kind = ?event.kind,
                reason = %reason,
                "Cache hook skipped"
            ),
        }

        event
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::cache::backing::testing::FakeStore;
    use crate::cache::config::CacheConfig;

    fn hooks_with(store: Arc<FakeStore>) -> (CacheHooks, Arc<TieredCache>) {
        let cache = Arc::new(TieredCache::new(&CacheConfig::default(), store));
        (
            CacheHooks::new(cache.clone(), Duration::from_secs(3600)),
            cache,
        )
    }

    fn document(value: Value) -> PostDocument {
        PostDocument::from_value(value).expect("object")
    }

    #[tokio::test]
    async fn written_document_replaces_cache_entry() {
        let store = Arc::new(FakeStore::new());
        store.insert_raw("post:3", r#"{"id":3,"title":"Old","tags":["a"]}"#);
        let (hooks, cache) = hooks_with(store.clone());

        let event = hooks
            .on_entity_written(&document(json!({"id": 3, "title": "New"})))
            .await;

        assert_eq!(event.outcome, HookOutcome::Applied);
        assert_eq!(
            event.kind,
            HookKind::PostWritten {
                post_id: Some(PostId::new(3))
            }
        );
        // Full replace, no merge with the old fields.
        assert_eq!(
            cache.get_json::<Value>("post:3").await,
            Some(json!({"id": 3, "title": "New"}))
        );
        assert_eq!(store.ttl("post:3"), Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn deleted_post_leaves_backing_store() {
        let store = Arc::new(FakeStore::new());
        let (hooks, _cache) = hooks_with(store.clone());
        hooks.on_entity_written(&document(json!({"id": 8}))).await;

        let event = hooks.on_entity_deleted(PostId::new(8)).await;

        assert_eq!(event.outcome, HookOutcome::Applied);
        assert_eq!(store.raw("post:8"), None);
    }

    #[tokio::test]
    async fn document_without_id_is_skipped() {
        let store = Arc::new(FakeStore::new());
        let (hooks, _cache) = hooks_with(store.clone());

        let event = hooks
            .on_entity_written(&document(json!({"title": "orphan"})))
            .await;

        assert!(matches!(event.outcome, HookOutcome::Skipped { .. }));
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn outage_is_reported_not_raised() {
        let store = Arc::new(FakeStore::new());
        store.set_unavailable(true);
        let (hooks, _cache) = hooks_with(store);

        let event = hooks.on_entity_deleted(PostId::new(1)).await;
        assert_eq!(event.outcome, HookOutcome::Degraded);
    }

    #[tokio::test]
    async fn epochs_increase() {
        let (hooks, _cache) = hooks_with(Arc::new(FakeStore::new()));

        let first = hooks.on_entity_deleted(PostId::new(1)).await;
        let second = hooks.on_entity_deleted(PostId::new(2)).await;

        assert!(first.epoch < second.epoch);
        assert_ne!(first.id, second.id);
    }
}
