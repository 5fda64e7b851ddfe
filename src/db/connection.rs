use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Type alias so downstream code can reference the logical database pool in a single place.
pub type DbPool = PgPool;

pub async fn create_pool(config: &Config) -> anyhow::Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_size)
        .acquire_timeout(config.db_acquire_timeout())
        .connect(&config.database_url())
        .await?;
    Ok(pool)
}
