use std::sync::Arc;

use crate::application::admin::{AdminPostService, AdminUserService};
use crate::application::comments::CommentService;
use crate::application::engagement::EngagementService;
use crate::application::feed::FeedService;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub engagement: Arc<EngagementService>,
    pub comments: Arc<CommentService>,
    pub admin_posts: Arc<AdminPostService>,
    pub admin_users: Arc<AdminUserService>,
    /// Present when storage is Postgres; the in-memory store is always healthy.
    pub db: Option<Arc<PostgresRepositories>>,
}
