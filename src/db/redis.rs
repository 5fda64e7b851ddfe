use bb8::Pool;
use bb8_redis::RedisConnectionManager;

use crate::config::Config;

pub type RedisPool = Pool<RedisConnectionManager>;

pub async fn create_redis_pool(config: &Config) -> anyhow::Result<RedisPool> {
    let manager = RedisConnectionManager::new(config.redis_url())?;
    let pool = Pool::builder()
        .max_size(config.redis_pool_size)
        .connection_timeout(config.redis_connect_timeout())
        .build(manager)
        .await?;

    tracing::info!(pool_size = config.redis_pool_size, "redis connection pool created");
    Ok(pool)
}
