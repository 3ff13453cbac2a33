#![allow(dead_code)]

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use penmark::application::admin::{
    AdminPostService, AdminUserService, CreatePostCommand, CreateUserCommand,
};
use penmark::application::comments::CommentService;
use penmark::application::engagement::EngagementService;
use penmark::application::feed::FeedService;
use penmark::application::query::ContentQueryEngine;
use penmark::application::repos::LikesRepo;
use penmark::cache::{CacheConfig, CacheStore, InvalidationCoordinator, ManualClock};
use penmark::domain::entities::{PostRecord, UserRecord};
use penmark::infra::http::HttpState;
use penmark::infra::memory::MemoryRepositories;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub repos: Arc<MemoryRepositories>,
    pub cache: Arc<CacheStore>,
    pub invalidator: Arc<InvalidationCoordinator>,
    pub feed: Arc<FeedService>,
    pub engagement: Arc<EngagementService>,
    pub comments: Arc<CommentService>,
    pub admin_posts: Arc<AdminPostService>,
    pub admin_users: Arc<AdminUserService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let clock = Arc::new(ManualClock::new(
            OffsetDateTime::UNIX_EPOCH + Duration::days(20_000),
        ));
        let repos = Arc::new(MemoryRepositories::with_clock(clock.clone()));
        Self::assemble(clock, repos.clone(), repos, config)
    }

    /// Same wiring, but engagement reads like relations through `likes`.
    pub fn with_likes(likes: Arc<dyn LikesRepo>, repos: Arc<MemoryRepositories>) -> Self {
        let clock = Arc::new(ManualClock::new(
            OffsetDateTime::UNIX_EPOCH + Duration::days(20_000),
        ));
        Self::assemble(clock, repos, likes, CacheConfig::default())
    }

    fn assemble(
        clock: Arc<ManualClock>,
        repos: Arc<MemoryRepositories>,
        likes: Arc<dyn LikesRepo>,
        config: CacheConfig,
    ) -> Self {
        let cache = Arc::new(CacheStore::with_clock(&config, clock.clone()));
        let invalidator = Arc::new(InvalidationCoordinator::new(config.clone(), cache.clone()));
        let read_cache = config.enabled.then(|| cache.clone());

        let engine = Arc::new(ContentQueryEngine::new(repos.clone()));
        let feed = FeedService::new(engine, repos.clone(), repos.clone())
            .with_cache_opt(read_cache.clone());
        let engagement =
            EngagementService::new(repos.clone(), repos.clone(), likes, invalidator.clone());
        let comments = CommentService::new(repos.clone(), repos.clone(), invalidator.clone())
            .with_cache_opt(read_cache.clone());
        let admin_posts = AdminPostService::new(repos.clone(), invalidator.clone());
        let admin_users =
            AdminUserService::new(repos.clone(), invalidator.clone()).with_cache_opt(read_cache);

        Self {
            clock,
            repos,
            cache,
            invalidator,
            feed: Arc::new(feed),
            engagement: Arc::new(engagement),
            comments: Arc::new(comments),
            admin_posts: Arc::new(admin_posts),
            admin_users: Arc::new(admin_users),
        }
    }

    pub fn http_state(&self) -> HttpState {
        HttpState {
            feed: self.feed.clone(),
            engagement: self.engagement.clone(),
            comments: self.comments.clone(),
            admin_posts: self.admin_posts.clone(),
            admin_users: self.admin_users.clone(),
            db: None,
        }
    }

    pub async fn user(&self, first: &str, last: &str, role: &str) -> UserRecord {
        self.admin_users
            .create(CreateUserCommand {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
                role: Some(role.to_string()),
            })
            .await
            .expect("create user")
    }

    pub async fn author(&self) -> UserRecord {
        self.user("Ada", "Lovelace", "author").await
    }

    /// Creates a published post one second after the previous one.
    pub async fn post(&self, author: &UserRecord, title: &str, content: &str) -> PostRecord {
        self.clock.advance(Duration::seconds(1));
        self.admin_posts
            .create(CreatePostCommand {
                author_id: author.id,
                title: title.to_string(),
                content: content.to_string(),
                published: true,
                tags: Vec::new(),
            })
            .await
            .expect("create post")
    }
}
