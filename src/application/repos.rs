//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::posts::{FeaturedFilter, PostBody, PostDocument, PostId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read side of the authoritative content store.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_post(&self, id: PostId) -> Result<Option<PostDocument>, RepoError>;

    /// Newest first, at most `limit` posts.
    async fn list_posts(
        &self,
        filter: FeaturedFilter,
        limit: u32,
    ) -> Result<Vec<PostDocument>, RepoError>;

    /// Case-insensitive substring match on title and excerpt, newest first.
    async fn search_posts(&self, query: &str, limit: u32)
    -> Result<Vec<PostDocument>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, body: PostBody) -> Result<PostDocument, RepoError>;

    /// Replace the stored body. `None` when no such post exists.
    async fn update_post(
        &self,
        id: PostId,
        body: PostBody,
    ) -> Result<Option<PostDocument>, RepoError>;

    /// `false` when no such post existed.
    async fn delete_post(&self, id: PostId) -> Result<bool, RepoError>;
}
