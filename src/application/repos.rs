//! Repository traits describing persistence adapters.
//!
//! Every method either fully succeeds or fully fails. Methods that pair a
//! relation change with a counter change (`add_like`, `remove_like`) perform
//! both as a single atomic unit.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};
use crate::domain::types::{SortSpec, StatusFilter, UserRole};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }
}

/// Filter half of a post listing; shared by `list_posts` and `count_posts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Case-insensitive substring matched against title or content.
    pub search: Option<String>,
    pub status: StatusFilter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostListQuery {
    pub filter: PostFilter,
    pub sort: SortSpec,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.published.is_none()
            && self.tags.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// Case-insensitive substring matched against first name, last name or email.
    pub search: Option<String>,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
}

/// A removed user plus the posts whose comments or likes went with them.
#[derive(Debug, Clone)]
pub struct DeletedUser {
    pub user: UserRecord,
    pub touched_posts: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateUserParams {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// One ordered page. Ties in the sort key are broken by id ascending.
    async fn list_posts(&self, query: &PostListQuery) -> Result<Vec<PostRecord>, RepoError>;

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError>;

    /// Every post, newest first.
    async fn list_all_posts(&self) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<PostRecord, RepoError>;

    /// Delete a post with its comments and like relations.
    async fn delete_post(&self, id: Uuid) -> Result<PostRecord, RepoError>;

    /// Delete every listed post that exists; returns the ids actually removed.
    async fn delete_posts(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, RepoError>;

    /// Atomically add one view; returns the new count.
    async fn increment_views(&self, id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait LikesRepo: Send + Sync {
    async fn has_like(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError>;

    /// Insert the relation and increment `likes`. Fails with `Duplicate` when
    /// the pair already exists, leaving the counter untouched.
    async fn add_like(&self, user_id: Uuid, post_id: Uuid) -> Result<u64, RepoError>;

    /// Delete the relation and decrement `likes`, never below zero. Returns
    /// `None` when there was no relation to delete.
    async fn remove_like(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<u64>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError>;

    /// Oldest first; equal timestamps keep insertion order.
    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;

    async fn count_by_post(&self, post_id: Uuid) -> Result<u64, RepoError>;

    async fn update_comment(&self, id: Uuid, content: String) -> Result<CommentRecord, RepoError>;

    async fn delete_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    /// Newest first, ties by id ascending.
    async fn list_users(&self, query: &UserQuery) -> Result<Vec<UserRecord>, RepoError>;

    async fn count_users(&self, search: Option<&str>) -> Result<u64, RepoError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    /// Fails with `Duplicate` on a repeated email or (first, last) name pair.
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError>;

    /// Fails with `Integrity` while the user still authors posts. The user's
    /// likes and comments are removed with them; `touched_posts` lists the
    /// posts that lost any, sorted and without duplicates.
    async fn delete_user(&self, id: Uuid) -> Result<DeletedUser, RepoError>;
}
