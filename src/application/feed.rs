//! Cached read paths for posts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::application::error::{AppError, RepoResultExt};
use crate::application::pagination::Page;
use crate::application::query::{ContentQueryEngine, PostListParams};
use crate::application::repos::{CommentsRepo, PostListQuery, PostsRepo};
use crate::cache::{CacheStore, keys, read_through};
use crate::domain::entities::PostRecord;

/// A single post as served on its own page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comment_count: u64,
}

#[derive(Clone)]
pub struct FeedService {
    engine: Arc<ContentQueryEngine>,
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    cache: Option<Arc<CacheStore>>,
}

impl FeedService {
    pub fn new(
        engine: Arc<ContentQueryEngine>,
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            engine,
            posts,
            comments,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_opt(mut self, cache: Option<Arc<CacheStore>>) -> Self {
        self.cache = cache;
        self
    }

    #[instrument(skip(self))]
    pub async fn list_posts(&self, params: &PostListParams) -> Result<Page<PostRecord>, AppError> {
        let query = PostListQuery::from_params(params)?;
        let key = query.cache_key();
        read_through(self.cache.as_deref(), &key, || self.engine.query(&query)).await
    }

    #[instrument(skip(self))]
    pub async fn all_posts(&self) -> Result<Vec<PostRecord>, AppError> {
        read_through(self.cache.as_deref(), &keys::all_posts(), || async {
            self.posts.list_all_posts().await.entity("post")
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn post_detail(&self, post_id: Uuid) -> Result<PostDetail, AppError> {
        read_through(self.cache.as_deref(), &keys::post_detail(post_id), || async {
            let post = self
                .posts
                .find_by_id(post_id)
                .await
                .entity("post")?
                .ok_or(AppError::not_found("post"))?;
            let comment_count = self.comments.count_by_post(post_id).await.entity("post")?;
            Ok(PostDetail {
                post,
                comment_count,
            })
        })
        .await
    }
}
