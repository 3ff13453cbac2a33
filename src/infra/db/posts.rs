use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, PostFilter, PostListQuery, PostPatch, PostsRepo, PostsWriteRepo, RepoError,
};
use crate::domain::entities::PostRecord;
use crate::domain::types::{SortDirection, SortField, SortSpec};

use super::PostgresRepositories;
use super::rows::{POST_COLUMNS, PostRow, posts_from_rows};
use super::util::{map_sqlx_error, to_count};

fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, sort: SortSpec) {
    // Byte-order collation keeps ordering identical to the in-memory adapter.
    let key = match sort.field {
        SortField::CreatedAt => "p.created_at",
        SortField::Title => "lower(p.title) COLLATE \"C\"",
        SortField::Author => "lower(u.first_name || ' ' || u.last_name) COLLATE \"C\"",
    };
    let direction = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    qb.push(format!(" ORDER BY {key} {direction}, p.id ASC"));
}

/// Wraps a data-modifying statement that returns post rows as `changed` and
/// joins the author back on.
fn with_author(cte: &str) -> String {
    format!(
        "WITH changed AS ({cte}) \
         SELECT {POST_COLUMNS} FROM changed p INNER JOIN users u ON u.id = p.author_id"
    )
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(&self, query: &PostListQuery) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p INNER JOIN users u ON u.id = p.author_id WHERE 1=1"
        ));
        Self::apply_post_filter(&mut qb, &query.filter);
        push_order_by(&mut qb, query.sort);

        let offset = i64::try_from(query.page.offset())
            .map_err(|_| RepoError::InvalidInput {
                message: "page offset out of range".to_string(),
            })?;
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(query.page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        posts_from_rows(rows)
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1");
        Self::apply_post_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        to_count(count)
    }

    async fn list_all_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p INNER JOIN users u ON u.id = p.author_id \
             ORDER BY p.created_at DESC, p.id ASC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        posts_from_rows(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p INNER JOIN users u ON u.id = p.author_id \
             WHERE p.id = $1"
        );
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(PostRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            author_id,
            title,
            content,
            published,
            tags,
        } = params;

        let now = OffsetDateTime::now_utc();
        let sql = with_author(
            "INSERT INTO posts (id, author_id, title, content, published, tags, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) RETURNING *",
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(author_id)
            .bind(title)
            .bind(content)
            .bind(published)
            .bind(tags)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        PostRecord::try_from(row)
    }

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<PostRecord, RepoError> {
        let sql = with_author(
            "UPDATE posts SET \
                title = COALESCE($2, title), \
                content = COALESCE($3, content), \
                published = COALESCE($4, published), \
                tags = COALESCE($5, tags), \
                updated_at = $6 \
             WHERE id = $1 RETURNING *",
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(patch.title)
            .bind(patch.content)
            .bind(patch.published)
            .bind(patch.tags)
            .bind(OffsetDateTime::now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;
        PostRecord::try_from(row)
    }

    async fn delete_post(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        let sql = with_author("DELETE FROM posts WHERE id = $1 RETURNING *");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;
        PostRecord::try_from(row)
    }

    async fn delete_posts(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, RepoError> {
        sqlx::query_scalar::<_, Uuid>("DELETE FROM posts WHERE id = ANY($1) RETURNING id")
            .bind(ids.to_vec())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError> {
        let views: i64 =
            sqlx::query_scalar("UPDATE posts SET views = views + 1 WHERE id = $1 RETURNING views")
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?
                .ok_or(RepoError::NotFound)?;
        to_count(views)
    }
}
