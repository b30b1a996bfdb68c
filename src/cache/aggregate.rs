//! Cached list views derived from the per-post entries.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::facade::TieredCache;
use super::keys::{CacheKey, POST_SCAN_PATTERN, is_index_key};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::posts::{FeaturedFilter, PostDocument, sort_by_recency};

const METRIC_INDEX_HIT_TOTAL: &str = "quire_cache_index_hit_total";
const METRIC_INDEX_COLD_TOTAL: &str = "quire_cache_index_cold_total";
const METRIC_INDEX_BUILD_MS: &str = "quire_cache_index_build_ms";

/// Answers list queries from a short-lived aggregate key, rebuilding it from
/// the per-post keys (or the content store when those are cold).
pub struct PostIndexCache {
    cache: Arc<TieredCache>,
    posts: Arc<dyn PostsRepo>,
    index_ttl: Duration,
    entity_ttl: Duration,
    page_size: usize,
}

impl PostIndexCache {
    pub fn new(cache: Arc<TieredCache>, posts: Arc<dyn PostsRepo>, config: &CacheConfig) -> Self {
        Self {
            cache,
            posts,
            index_ttl: config.index_ttl(),
            entity_ttl: config.entity_ttl(),
            page_size: config.index_page_size(),
        }
    }

    /// Newest-first page of posts matching `filter`.
    ///
    /// Only a content-store failure on the cold path is an error; everything
    /// the cache tiers do wrong degrades to the next step.
    pub async fn list(&self, filter: FeaturedFilter) -> Result<Vec<PostDocument>, RepoError> {
        let index_key = CacheKey::PostIndex(filter).render();

        let cached = self
            .cache
            .get_json::<Vec<PostDocument>>(&index_key)
            .await
            .filter(|posts| !posts.is_empty());
        if let Some(posts) = cached {
            counter!(METRIC_INDEX_HIT_TOTAL, "view" => filter.view_name()).increment(1);
            return Ok(posts);
        }

        let started = Instant::now();
        let mut posts = self.collect_from_entities(filter).await;

        if posts.is_empty() {
            counter!(METRIC_INDEX_COLD_TOTAL, "view" => filter.view_name()).increment(1);
            debug!(view = filter.view_name(), "Entity keys cold, reading content store");
            posts = self.posts.list_posts(filter, self.page_limit()).await?;
            self.repopulate_entities(&posts);
        }

        histogram!(METRIC_INDEX_BUILD_MS, "view" => filter.view_name())
            .record(started.elapsed().as_secs_f64() * 1000.0);

        if let Err(err) = self
            .cache
            .set_json(&index_key, &posts, Some(self.index_ttl))
            .await
        {
            warn!(key = %index_key, error = %err, "Failed to cache list view");
        }

        Ok(posts)
    }

    async fn collect_from_entities(&self, filter: FeaturedFilter) -> Vec<PostDocument> {
        let keys: Vec<String> = self
            .cache
            .scan_keys(POST_SCAN_PATTERN)
            .await
            .into_iter()
            .filter(|key| !is_index_key(key))
            .collect();

        if keys.is_empty() {
            return Vec::new();
        }

        let mut posts: Vec<PostDocument> = self
            .cache
            .get_json_many::<PostDocument>(&keys)
            .await
            .into_iter()
            .flatten()
            .filter(|post| filter.matches(post))
            .collect();

        sort_by_recency(&mut posts);
        posts.truncate(self.page_size);
        posts
    }

    /// Best effort: the spawned task's result is never observed.
    fn repopulate_entities(&self, posts: &[PostDocument]) {
        if posts.is_empty() {
            return;
        }

        let cache = Arc::clone(&self.cache);
        let ttl = self.entity_ttl;
        let posts = posts.to_vec();
        tokio::spawn(async move {
            for post in posts {
                let Some(id) = post.id() else {
                    continue;
                };
                let key = CacheKey::Post(id).render();
                if let Err(err) = cache.set_json(&key, &post, Some(ttl)).await {
                    debug!(key = %key, error = %err, "Background repopulation skipped entry");
                }
            }
        });
    }

    fn page_limit(&self) -> u32 {
        u32::try_from(self.page_size).unwrap_or(u32::MAX)
    }
}
