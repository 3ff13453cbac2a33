//! Like toggles and view counting.
//!
//! `toggle_like` is compare-and-swap shaped: it reads the relation, then asks
//! storage for the opposite state. Storage performs relation and counter
//! changes as one unit, so a request that loses a race against another toggle
//! for the same pair sees `Duplicate` (insert lost) or `None` (delete lost).
//! The loser reports the state the winner produced instead of failing.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::error::{AppError, RepoResultExt};
use crate::application::repos::{LikesRepo, PostsRepo, PostsWriteRepo, RepoError};
use crate::cache::{InvalidationCoordinator, Mutation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub likes: u64,
    pub liked: bool,
}

#[derive(Clone)]
pub struct EngagementService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    likes: Arc<dyn LikesRepo>,
    invalidator: Arc<InvalidationCoordinator>,
}

impl EngagementService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        likes: Arc<dyn LikesRepo>,
        invalidator: Arc<InvalidationCoordinator>,
    ) -> Self {
        Self {
            posts,
            writer,
            likes,
            invalidator,
        }
    }

    #[instrument(skip(self))]
    pub async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeOutcome, AppError> {
        self.ensure_post(post_id).await?;

        let outcome = if self.likes.has_like(user_id, post_id).await.entity("post")? {
            match self.likes.remove_like(user_id, post_id).await.entity("post")? {
                Some(likes) => LikeOutcome {
                    likes,
                    liked: false,
                },
                None => {
                    debug!(%user_id, %post_id, "Unlike lost a race; reporting current state");
                    self.current_state(user_id, post_id).await?
                }
            }
        } else {
            match self.likes.add_like(user_id, post_id).await {
                Ok(likes) => LikeOutcome { likes, liked: true },
                Err(RepoError::Duplicate { .. }) => {
                    debug!(%user_id, %post_id, "Like lost a race; reporting current state");
                    self.current_state(user_id, post_id).await?
                }
                Err(err) => return Err(AppError::from_repo("post", err)),
            }
        };

        self.invalidator
            .invalidate(&Mutation::LikeToggled { post_id });
        Ok(outcome)
    }

    /// Per-caller, so never served from the cache.
    pub async fn has_liked(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, AppError> {
        self.likes.has_like(user_id, post_id).await.entity("post")
    }

    #[instrument(skip(self))]
    pub async fn register_view(&self, post_id: Uuid) -> Result<(), AppError> {
        let views = self.writer.increment_views(post_id).await.entity("post")?;
        debug!(%post_id, views, "View registered");
        self.invalidator
            .invalidate(&Mutation::ViewRegistered { post_id });
        Ok(())
    }

    async fn ensure_post(&self, post_id: Uuid) -> Result<(), AppError> {
        self.posts
            .find_by_id(post_id)
            .await
            .entity("post")?
            .map(|_| ())
            .ok_or(AppError::not_found("post"))
    }

    async fn current_state(&self, user_id: Uuid, post_id: Uuid) -> Result<LikeOutcome, AppError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await
            .entity("post")?
            .ok_or(AppError::not_found("post"))?;
        let liked = self.likes.has_like(user_id, post_id).await.entity("post")?;
        Ok(LikeOutcome {
            likes: post.likes,
            liked,
        })
    }
}
