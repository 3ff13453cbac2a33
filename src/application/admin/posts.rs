use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::error::{AppError, RepoResultExt};
use crate::application::repos::{CreatePostParams, PostPatch, PostsWriteRepo};
use crate::cache::{InvalidationCoordinator, Mutation};
use crate::domain::entities::PostRecord;
use crate::domain::error::ensure_non_empty;
use crate::domain::posts::normalize_tags;

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub tags: Vec<String>,
}

#[derive(Clone)]
pub struct AdminPostService {
    writer: Arc<dyn PostsWriteRepo>,
    invalidator: Arc<InvalidationCoordinator>,
}

impl AdminPostService {
    pub fn new(writer: Arc<dyn PostsWriteRepo>, invalidator: Arc<InvalidationCoordinator>) -> Self {
        Self {
            writer,
            invalidator,
        }
    }

    #[instrument(skip(self, command), fields(author_id = %command.author_id))]
    pub async fn create(&self, command: CreatePostCommand) -> Result<PostRecord, AppError> {
        ensure_non_empty(&command.title, "title")?;
        ensure_non_empty(&command.content, "content")?;

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: command.author_id,
                title: command.title.trim().to_string(),
                content: command.content,
                published: command.published,
                tags: normalize_tags(command.tags),
            })
            .await
            .entity("author")?;

        self.invalidator
            .invalidate(&Mutation::PostCreated { post_id: post.id });
        Ok(post)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: Uuid, patch: PostPatch) -> Result<PostRecord, AppError> {
        if patch.is_empty() {
            return Err(AppError::validation("update must change at least one field"));
        }
        if let Some(title) = patch.title.as_deref() {
            ensure_non_empty(title, "title")?;
        }
        if let Some(content) = patch.content.as_deref() {
            ensure_non_empty(content, "content")?;
        }

        let patch = PostPatch {
            title: patch.title.map(|title| title.trim().to_string()),
            tags: patch.tags.map(normalize_tags),
            ..patch
        };
        let post = self.writer.update_post(id, patch).await.entity("post")?;

        self.invalidator
            .invalidate(&Mutation::PostUpdated { post_id: id });
        Ok(post)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<PostRecord, AppError> {
        let post = self.writer.delete_post(id).await.entity("post")?;
        self.invalidator
            .invalidate(&Mutation::PostDeleted { post_id: id });
        Ok(post)
    }

    /// Deletes whichever of `ids` exist and returns how many were removed.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn bulk_delete(&self, ids: &[Uuid]) -> Result<usize, AppError> {
        if ids.is_empty() {
            return Err(AppError::validation("`ids` must not be empty"));
        }

        let removed = self.writer.delete_posts(ids).await.entity("post")?;
        info!(removed = removed.len(), "Bulk delete completed");
        if !removed.is_empty() {
            self.invalidator.invalidate(&Mutation::PostsBulkDeleted {
                post_ids: removed.clone(),
            });
        }
        Ok(removed.len())
    }
}
