//! Postgres-backed relational store for jobs, media, and users.
//!
//! One `PgPool` per process, capped at a handful of connections to fit the
//! ≈1 GB RAM budget, and a thin repository layer over it: callers work with
//! `scrape_types` domain structs, never raw rows.

pub mod job_repository;
pub mod media_repository;
pub mod pagination;
pub mod user_repository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub use job_repository::JobRepository;
pub use media_repository::{MediaFilter, MediaRepository, MediaStats};
pub use pagination::{Page, Pagination};
pub use user_repository::UserRepository;

/// Connect to Postgres with a pool small enough for a ~1 GB RAM deployment.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}

/// Run pending migrations. Idempotent; safe to call on every startup.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
