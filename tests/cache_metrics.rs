mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::Harness;
use metrics_util::debugging::DebuggingRecorder;
use quire::cache::{BackingStore, CacheConfig, RedisStore, TieredCache};
use quire::domain::posts::FeaturedFilter;
use serde_json::{Value, json};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let harness = Harness::new();

    // Backing hit, then memory hit.
    harness.store.put_raw("post:1", r#"{"id":1,"createdAt":"2024-01-01"}"#);
    assert!(harness.cache.get_json::<Value>("post:1").await.is_some());
    assert!(harness.cache.get_json::<Value>("post:1").await.is_some());

    // Miss in both tiers.
    assert!(harness.cache.get_json::<Value>("post:2").await.is_none());

    // Undecodable payload.
    harness.store.put_raw("post:3", "not json");
    assert!(harness.cache.get_json::<Value>("post:3").await.is_none());

    // Index built from entities, then served from the cached view.
    harness
        .post_service
        .list_posts(FeaturedFilter::All)
        .await
        .expect("list");
    harness
        .post_service
        .list_posts(FeaturedFilter::All)
        .await
        .expect("list");

    // Cold view with nothing cached falls back to the content store.
    harness.posts.seed(json!({"id": 9, "featured": true}));
    harness
        .post_service
        .list_posts(FeaturedFilter::Featured)
        .await
        .expect("list");

    // Port 1 refuses connections; the failure is counted and swallowed.
    let unreachable = RedisStore::new("redis://127.0.0.1:1/", 10, 0).expect("valid url");
    assert_eq!(unreachable.get("post:1").await, None);
    let cache = TieredCache::new(&CacheConfig::default(), Arc::new(unreachable));
    assert!(cache.get_json::<Value>("post:1").await.is_none());

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "quire_cache_l1_hit_total",
        "quire_cache_l1_miss_total",
        "quire_cache_backing_hit_total",
        "quire_cache_backing_miss_total",
        "quire_cache_backing_error_total",
        "quire_cache_corrupt_total",
        "quire_cache_index_hit_total",
        "quire_cache_index_cold_total",
        "quire_cache_index_build_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
