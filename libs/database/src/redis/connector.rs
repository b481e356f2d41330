use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use super::RedisConfig;
use crate::common::{DatabaseError, RetryConfig, retry_with_backoff};

/// Open a reconnecting connection and verify it with `PING`
pub async fn connect(config: &RedisConfig) -> redis::RedisResult<ConnectionManager> {
    let client = Client::open(config.url.as_str())?;
    let mut manager = ConnectionManager::new(client).await?;

    let _: String = redis::cmd("PING").query_async(&mut manager).await?;

    info!("Connected to Redis");
    Ok(manager)
}

/// [`connect`] with exponential backoff
pub async fn connect_with_retry(
    config: &RedisConfig,
    retry_config: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    retry_with_backoff(|| connect(config), retry_config.unwrap_or_default()).await
}

/// Readiness probe
pub async fn check_health(conn: &ConnectionManager) -> Result<(), DatabaseError> {
    debug!("Running Redis health check");
    let mut conn = conn.clone();
    let pong: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(format!("Redis: {e}")))?;

    if pong == "PONG" {
        Ok(())
    } else {
        Err(DatabaseError::HealthCheckFailed(format!(
            "Redis: unexpected PING reply {pong}"
        )))
    }
}
