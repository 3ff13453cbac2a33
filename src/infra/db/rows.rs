use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::entities::{AuthorSummary, CommentRecord, PostRecord, UserRecord};
use crate::domain::types::UserRole;

use super::util::to_count;

pub(crate) const POST_COLUMNS: &str = "p.id, p.title, p.content, p.published, p.tags, p.views, \
     p.likes, p.created_at, p.updated_at, u.id AS author_id, \
     u.first_name AS author_first_name, u.last_name AS author_last_name";

pub(crate) const COMMENT_COLUMNS: &str = "c.id, c.post_id, c.content, c.created_at, c.updated_at, \
     u.id AS author_id, u.first_name AS author_first_name, u.last_name AS author_last_name";

pub(crate) const USER_COLUMNS: &str =
    "id, first_name, last_name, email, role, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) published: bool,
    pub(crate) tags: Vec<String>,
    pub(crate) views: i64,
    pub(crate) likes: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
    pub(crate) author_id: Uuid,
    pub(crate) author_first_name: String,
    pub(crate) author_last_name: String,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            content: row.content,
            published: row.published,
            author: AuthorSummary {
                id: row.author_id,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
            },
            tags: row.tags,
            views: to_count(row.views)?,
            likes: to_count(row.likes)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub(crate) id: Uuid,
    pub(crate) post_id: Uuid,
    pub(crate) content: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
    pub(crate) author_id: Uuid,
    pub(crate) author_first_name: String,
    pub(crate) author_last_name: String,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author: AuthorSummary {
                id: row.author_id,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
            },
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub(crate) id: Uuid,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) email: String,
    pub(crate) role: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = UserRole::parse(&row.role).ok_or_else(|| {
            RepoError::from_persistence(format!("unknown user role `{}`", row.role))
        })?;
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn posts_from_rows(rows: Vec<PostRow>) -> Result<Vec<PostRecord>, RepoError> {
    rows.into_iter().map(PostRecord::try_from).collect()
}
