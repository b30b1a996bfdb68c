use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::repos::{PostsRepo, RepoError},
    cache::{CacheKey, TieredCache},
    domain::posts::FeaturedFilter,
};

#[derive(Debug, Error)]
pub enum CacheWarmError {
    #[error("failed to load posts: {0}")]
    Load(#[from] RepoError),
}

/// Counts from one warm run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub loaded: usize,
    pub cached: usize,
    pub skipped: usize,
}

/// Copies the newest posts from the content store into both cache tiers.
pub struct CacheWarmer {
    posts: Arc<dyn PostsRepo>,
    cache: Arc<TieredCache>,
    entity_ttl: Duration,
    limit: u32,
}

impl CacheWarmer {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        cache: Arc<TieredCache>,
        entity_ttl: Duration,
        limit: u32,
    ) -> Self {
        Self {
            posts,
            cache,
            entity_ttl,
            limit,
        }
    }

    pub async fn warm(&self) -> Result<WarmReport, CacheWarmError> {
        info!(
            target = "quire::cache_warmer",
            limit = self.limit,
            backing = %self.cache.backing_mode(),
            "warming post cache"
        );

        let posts = self.posts.list_posts(FeaturedFilter::All, self.limit).await?;
        let mut report = WarmReport {
            loaded: posts.len(),
            ..WarmReport::default()
        };

        for post in &posts {
            let Some(id) = post.id() else {
                report.skipped += 1;
                continue;
            };
            let key = CacheKey::Post(id).render();
            match self.cache.set_json(&key, post, Some(self.entity_ttl)).await {
                Ok(()) => report.cached += 1,
                Err(err) => {
                    warn!(target = "quire::cache_warmer", key = %key, error = %err, "post not cached");
                    report.skipped += 1;
                }
            }
        }

        info!(
            target = "quire::cache_warmer",
            loaded = report.loaded,
            cached = report.cached,
            skipped = report.skipped,
            "post cache warmed"
        );
        Ok(report)
    }
}
