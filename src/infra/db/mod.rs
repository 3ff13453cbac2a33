//! Postgres-backed repository implementations.

mod comments;
mod likes;
mod posts;
mod rows;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::PostFilter;

use self::util::contains_pattern;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Appends ` AND ...` clauses for `filter`; the query must already have a
    /// `WHERE` and alias posts as `p`.
    fn apply_post_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
        if let Some(published) = filter.status.published() {
            qb.push(" AND p.published = ");
            qb.push_bind(published);
        }

        if let Some(search) = filter.search.as_deref() {
            let pattern = contains_pattern(search);
            qb.push(" AND (p.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR p.content ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }
}
