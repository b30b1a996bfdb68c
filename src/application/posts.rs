//! Read and write paths for posts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::application::error::AppError;
use crate::application::repos::{PostsRepo, PostsWriteRepo};
use crate::cache::{CacheHooks, CacheKey, PostIndexCache, TieredCache};
use crate::domain::posts::{FeaturedFilter, PostBody, PostDocument, PostId};

/// Cache-aside reads of single posts and list views.
#[derive(Clone)]
pub struct PostService {
    cache: Arc<TieredCache>,
    index: Arc<PostIndexCache>,
    posts: Arc<dyn PostsRepo>,
    entity_ttl: Duration,
}

impl PostService {
    pub fn new(
        cache: Arc<TieredCache>,
        index: Arc<PostIndexCache>,
        posts: Arc<dyn PostsRepo>,
        entity_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            index,
            posts,
            entity_ttl,
        }
    }

    pub async fn get_post(&self, id: PostId) -> Result<PostDocument, AppError> {
        let key = CacheKey::Post(id).render();

        if let Some(post) = self.cache.get_json::<PostDocument>(&key).await {
            return Ok(post);
        }

        let post = self.posts.find_post(id).await.map_err(|err| {
            error!(post_id = %id, error = %err, "Post lookup failed on cache miss");
            AppError::from(err)
        })?;
        let Some(post) = post else {
            debug!(post_id = %id, "Post not found");
            return Err(AppError::NotFound);
        };

        if let Err(err) = self.cache.set_json(&key, &post, Some(self.entity_ttl)).await {
            debug!(key = %key, error = %err, "Fetched post was not cached");
        }

        Ok(post)
    }

    pub async fn list_posts(&self, filter: FeaturedFilter) -> Result<Vec<PostDocument>, AppError> {
        self.index.list(filter).await.map_err(|err| {
            error!(view = filter.view_name(), error = %err, "List view could not be built");
            AppError::from(err)
        })
    }
}

/// Store-first mutations. The cache hook runs only after the store commits
/// and never changes the outcome.
#[derive(Clone)]
pub struct PostWriteService {
    writer: Arc<dyn PostsWriteRepo>,
    hooks: Arc<CacheHooks>,
}

impl PostWriteService {
    pub fn new(writer: Arc<dyn PostsWriteRepo>, hooks: Arc<CacheHooks>) -> Self {
        Self { writer, hooks }
    }

    pub async fn create(&self, body: PostBody) -> Result<PostDocument, AppError> {
        let post = self.writer.create_post(body).await?;
        self.hooks.on_entity_written(&post).await;
        Ok(post)
    }

    pub async fn update(&self, id: PostId, body: PostBody) -> Result<PostDocument, AppError> {
        let Some(post) = self.writer.update_post(id, body).await? else {
            return Err(AppError::NotFound);
        };
        self.hooks.on_entity_written(&post).await;
        Ok(post)
    }

    pub async fn delete(&self, id: PostId) -> Result<(), AppError> {
        if !self.writer.delete_post(id).await? {
            return Err(AppError::NotFound);
        }
        self.hooks.on_entity_deleted(id).await;
        Ok(())
    }
}
