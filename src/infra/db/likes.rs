use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{LikesRepo, RepoError};

use super::PostgresRepositories;
use super::util::{map_sqlx_error, to_count};

const POST_LIKES_PKEY: &str = "post_likes_pkey";

// Relation and counter change in one statement. `ON CONFLICT DO NOTHING`
// makes a losing concurrent insert produce no row instead of an error.
const ADD_LIKE: &str = "WITH inserted AS ( \
        INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2) \
        ON CONFLICT (user_id, post_id) DO NOTHING \
        RETURNING post_id \
    ) \
    UPDATE posts SET likes = likes + 1 \
    WHERE id IN (SELECT post_id FROM inserted) \
    RETURNING likes";

const REMOVE_LIKE: &str = "WITH removed AS ( \
        DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2 \
        RETURNING post_id \
    ) \
    UPDATE posts SET likes = GREATEST(likes - 1, 0) \
    WHERE id IN (SELECT post_id FROM removed) \
    RETURNING likes";

#[async_trait]
impl LikesRepo for PostgresRepositories {
    async fn has_like(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM post_likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn add_like(&self, user_id: Uuid, post_id: Uuid) -> Result<u64, RepoError> {
        let likes: Option<i64> = sqlx::query_scalar(ADD_LIKE)
            .bind(user_id)
            .bind(post_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        match likes {
            Some(likes) => to_count(likes),
            None => Err(RepoError::duplicate(POST_LIKES_PKEY)),
        }
    }

    async fn remove_like(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<u64>, RepoError> {
        let likes: Option<i64> = sqlx::query_scalar(REMOVE_LIKE)
            .bind(user_id)
            .bind(post_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        likes.map(to_count).transpose()
    }
}
