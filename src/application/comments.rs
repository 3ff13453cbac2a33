use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::application::error::{AppError, RepoResultExt};
use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo};
use crate::cache::{CacheStore, InvalidationCoordinator, Mutation, keys, read_through};
use crate::domain::comments::normalize_comment;
use crate::domain::entities::CommentRecord;

/// Comment thread scoped to a post.
#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    invalidator: Arc<InvalidationCoordinator>,
    cache: Option<Arc<CacheStore>>,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        invalidator: Arc<InvalidationCoordinator>,
    ) -> Self {
        Self {
            posts,
            comments,
            invalidator,
            cache: None,
        }
    }

    pub fn with_cache_opt(mut self, cache: Option<Arc<CacheStore>>) -> Self {
        self.cache = cache;
        self
    }

    #[instrument(skip(self, content))]
    pub async fn create(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<CommentRecord, AppError> {
        let content = normalize_comment(content)?;
        self.ensure_post(post_id).await?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                user_id,
                content,
            })
            .await
            .entity("comment")?;

        self.invalidator
            .invalidate(&Mutation::CommentCreated { post_id });
        Ok(comment)
    }

    /// Oldest first.
    pub async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, AppError> {
        read_through(self.cache.as_deref(), &keys::post_comments(post_id), || async {
            self.ensure_post(post_id).await?;
            self.comments.list_by_post(post_id).await.entity("comment")
        })
        .await
    }

    #[instrument(skip(self, content))]
    pub async fn update(&self, comment_id: Uuid, content: &str) -> Result<CommentRecord, AppError> {
        let content = normalize_comment(content)?;
        let comment = self
            .comments
            .update_comment(comment_id, content)
            .await
            .entity("comment")?;

        self.invalidator.invalidate(&Mutation::CommentUpdated {
            post_id: comment.post_id,
        });
        Ok(comment)
    }

    /// Returns the removed comment so callers know which post it belonged to.
    #[instrument(skip(self))]
    pub async fn delete(&self, comment_id: Uuid) -> Result<CommentRecord, AppError> {
        let comment = self
            .comments
            .delete_comment(comment_id)
            .await
            .entity("comment")?
            .ok_or(AppError::not_found("comment"))?;

        self.invalidator.invalidate(&Mutation::CommentDeleted {
            post_id: comment.post_id,
        });
        Ok(comment)
    }

    async fn ensure_post(&self, post_id: Uuid) -> Result<(), AppError> {
        match self.posts.find_by_id(post_id).await.entity("post")? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("post")),
        }
    }
}
