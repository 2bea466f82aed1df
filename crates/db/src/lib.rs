//! Record-store and blob-store implementations.
//!
//! [`pg::PgJobStore`] is the production job/batch store;
//! [`memory::MemoryJobStore`] and [`memory::MemoryBlobStore`] back tests
//! and local development; [`fs_blob::FsBlobStore`] keeps blobs on local
//! disk behind the same trait the cloud tiers would implement.

use sqlx::postgres::PgPoolOptions;

pub mod fs_blob;
pub mod memory;
pub mod pg;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to verify connectivity.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
