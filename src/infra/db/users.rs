use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateUserParams, DeletedUser, RepoError, UpdateUserParams, UserQuery, UsersRepo,
};
use crate::domain::entities::UserRecord;

use super::PostgresRepositories;
use super::rows::{USER_COLUMNS, UserRow};
use super::util::{contains_pattern, map_sqlx_error, to_count};

fn apply_user_search(qb: &mut QueryBuilder<'_, Postgres>, search: Option<&str>) {
    if let Some(search) = search {
        let pattern = contains_pattern(search);
        qb.push(" AND (first_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR last_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR email ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn list_users(&self, query: &UserQuery) -> Result<Vec<UserRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1"));
        apply_user_search(&mut qb, query.search.as_deref());

        let offset = i64::try_from(query.page.offset()).map_err(|_| RepoError::InvalidInput {
            message: "page offset out of range".to_string(),
        })?;
        qb.push(" ORDER BY created_at DESC, id ASC LIMIT ");
        qb.push_bind(i64::from(query.page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn count_users(&self, search: Option<&str>) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1");
        apply_user_search(&mut qb, search);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        to_count(count)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "INSERT INTO users (id, first_name, last_name, email, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.first_name)
            .bind(params.last_name)
            .bind(params.email)
            .bind(params.role.as_str())
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        UserRecord::try_from(row)
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "UPDATE users SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                updated_at = $4 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(params.id)
            .bind(params.first_name)
            .bind(params.last_name)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;
        UserRecord::try_from(row)
    }

    async fn delete_user(&self, id: Uuid) -> Result<DeletedUser, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let authors_posts: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE author_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        if authors_posts {
            return Err(RepoError::Integrity {
                message: "user still authors posts".to_string(),
            });
        }

        // The relation rows would cascade away; settle the counters first.
        let touched_posts: Vec<Uuid> = sqlx::query_scalar(
            "WITH removed AS (DELETE FROM post_likes WHERE user_id = $1 RETURNING post_id), \
             unliked AS ( \
                 UPDATE posts SET likes = GREATEST(likes - 1, 0) \
                 WHERE id IN (SELECT post_id FROM removed) RETURNING id \
             ), \
             uncommented AS (DELETE FROM comments WHERE user_id = $1 RETURNING post_id) \
             SELECT id FROM unliked UNION SELECT post_id FROM uncommented ORDER BY 1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let sql = format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(DeletedUser {
            user: UserRecord::try_from(row)?,
            touched_posts,
        })
    }
}
