use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::posts::{FeaturedFilter, PostDocument, PostId};
use crate::infra::db::{PostgresRepositories, escape_like, map_sqlx_error};

use super::POST_COLUMNS;
use super::types::PostRow;

const FEATURED_EXPR: &str = "COALESCE(document -> 'featured' = 'true'::jsonb, false)";

impl PostgresRepositories {
    fn select_posts<'q>() -> QueryBuilder<'q, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM posts WHERE 1=1 ");
        qb
    }

    fn push_newest_first<'q>(qb: &mut QueryBuilder<'q, Postgres>, limit: u32) {
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(i64::from(limit));
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_post(&self, id: PostId) -> Result<Option<PostDocument>, RepoError> {
        let mut qb = Self::select_posts();
        qb.push(" AND id = ");
        qb.push_bind(id.get());

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostDocument::from))
    }

    async fn list_posts(
        &self,
        filter: FeaturedFilter,
        limit: u32,
    ) -> Result<Vec<PostDocument>, RepoError> {
        let mut qb = Self::select_posts();
        if let Some(featured) = filter.flag() {
            qb.push(" AND ");
            qb.push(FEATURED_EXPR);
            qb.push(" = ");
            qb.push_bind(featured);
        }
        Self::push_newest_first(&mut qb, limit);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostDocument::from).collect())
    }

    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<PostDocument>, RepoError> {
        let pattern = format!("%{}%", escape_like(query));

        let mut qb = Self::select_posts();
        qb.push(" AND (document ->> 'title' ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR document ->> 'excerpt' ILIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\') ");
        Self::push_newest_first(&mut qb, limit);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostDocument::from).collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
