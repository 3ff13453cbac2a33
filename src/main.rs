use std::{future::IntoFuture, process, sync::Arc};

use penmark::{
    application::{
        admin::{AdminPostService, AdminUserService},
        comments::CommentService,
        engagement::EngagementService,
        error::AppError,
        feed::FeedService,
        query::ContentQueryEngine,
        repos::{CommentsRepo, LikesRepo, PostsRepo, PostsWriteRepo, UsersRepo},
    },
    cache::{CacheConfig, CacheStore, InvalidationCoordinator, spawn_sweeper},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;
    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;
    info!(target: "penmark::migrate", "Migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let cache = Arc::new(CacheStore::new(&cache_config));

    let http_state = match settings.database.url.as_deref() {
        Some(url) => {
            let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
                .await
                .map_err(InfraError::from)?;
            PostgresRepositories::run_migrations(&pool)
                .await
                .map_err(InfraError::from)?;
            let repositories = Arc::new(PostgresRepositories::new(pool));
            info!(target: "penmark::storage", "Using Postgres storage");
            build_http_state(
                repositories.clone(),
                Some(repositories),
                &cache_config,
                cache.clone(),
            )
        }
        None => {
            warn!(
                target: "penmark::storage",
                "No database url configured; using in-memory storage"
            );
            build_http_state(
                Arc::new(MemoryRepositories::new()),
                None,
                &cache_config,
                cache.clone(),
            )
        }
    };

    let sweeper: Option<JoinHandle<()>> = cache_config
        .enabled
        .then(|| spawn_sweeper(cache.clone(), cache_config.sweep_interval()));

    let result = serve_http(&settings, http_state).await;

    if let Some(handle) = sweeper {
        handle.abort();
        let _ = handle.await;
    }

    result
}

fn build_http_state<R>(
    repositories: Arc<R>,
    db: Option<Arc<PostgresRepositories>>,
    cache_config: &CacheConfig,
    cache: Arc<CacheStore>,
) -> HttpState
where
    R: PostsRepo + PostsWriteRepo + LikesRepo + CommentsRepo + UsersRepo + 'static,
{
    let posts: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write: Arc<dyn PostsWriteRepo> = repositories.clone();
    let likes: Arc<dyn LikesRepo> = repositories.clone();
    let comments: Arc<dyn CommentsRepo> = repositories.clone();
    let users: Arc<dyn UsersRepo> = repositories;

    let invalidator = Arc::new(InvalidationCoordinator::new(
        cache_config.clone(),
        cache.clone(),
    ));
    let read_cache = cache_config.enabled.then_some(cache);

    let engine = Arc::new(ContentQueryEngine::new(posts.clone()));
    let feed = FeedService::new(engine, posts.clone(), comments.clone())
        .with_cache_opt(read_cache.clone());
    let engagement = EngagementService::new(
        posts.clone(),
        posts_write.clone(),
        likes,
        invalidator.clone(),
    );
    let comment_service = CommentService::new(posts, comments, invalidator.clone())
        .with_cache_opt(read_cache.clone());
    let admin_posts = AdminPostService::new(posts_write, invalidator.clone());
    let admin_users = AdminUserService::new(users, invalidator).with_cache_opt(read_cache);

    HttpState {
        feed: Arc::new(feed),
        engagement: Arc::new(engagement),
        comments: Arc::new(comment_service),
        admin_posts: Arc::new(admin_posts),
        admin_users: Arc::new(admin_users),
        db,
    }
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(target: "penmark::http", addr = %settings.server.addr, "Listening");

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    let outcome = tokio::select! {
        outcome = &mut server => outcome,
        _ = shutdown.notified() => {
            info!(target: "penmark::http", "Shutdown requested; draining connections");
            match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(target: "penmark::http", "Graceful shutdown timed out");
                    Ok(())
                }
            }
        }
    };

    outcome.map_err(|err| AppError::from(InfraError::from(err)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
