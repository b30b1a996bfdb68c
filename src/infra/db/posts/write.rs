use async_trait::async_trait;
use sqlx::types::Json;

use crate::application::repos::{PostsWriteRepo, RepoError};
use crate::domain::posts::{PostBody, PostDocument, PostId};
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

use super::POST_COLUMNS;
use super::types::PostRow;

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, body: PostBody) -> Result<PostDocument, RepoError> {
        let sql = format!("INSERT INTO posts (document) VALUES ($1) RETURNING {POST_COLUMNS}");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(Json(body.into_fields()))
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostDocument::from(row))
    }

    async fn update_post(
        &self,
        id: PostId,
        body: PostBody,
    ) -> Result<Option<PostDocument>, RepoError> {
        let sql = format!(
            "UPDATE posts SET document = $2, updated_at = now() WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id.get())
            .bind(Json(body.into_fields()))
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostDocument::from))
    }

    async fn delete_post(&self, id: PostId) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id.get())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
