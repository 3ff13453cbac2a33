use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::entities::CommentRecord;

use super::PostgresRepositories;
use super::rows::{COMMENT_COLUMNS, CommentRow};
use super::util::{map_sqlx_error, to_count};

fn with_author(cte: &str) -> String {
    format!(
        "WITH changed AS ({cte}) \
         SELECT {COMMENT_COLUMNS} FROM changed c INNER JOIN users u ON u.id = c.user_id"
    )
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError> {
        let sql = with_author(
            "INSERT INTO comments (id, post_id, user_id, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING *",
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.post_id)
            .bind(params.user_id)
            .bind(params.content)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c INNER JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.seq ASC"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn count_by_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        to_count(count)
    }

    async fn update_comment(&self, id: Uuid, content: String) -> Result<CommentRecord, RepoError> {
        let sql = with_author(
            "UPDATE comments SET content = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .bind(content)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(CommentRecord::from)
            .ok_or(RepoError::NotFound)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let sql = with_author("DELETE FROM comments WHERE id = $1 RETURNING *");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(CommentRecord::from))
    }
}
