//! Cache-aside storage of credentials, keyed `"{ProviderTag}:{id}"`.
//!
//! Backends deal in raw JSON strings; [`get_credential`] and
//! [`set_credential`] do the typed encoding on top.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::{MailError, MailResult};
use crate::models::{Credential, Provider};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialCache: Send + Sync {
    async fn exists(&self, key: &str) -> MailResult<bool>;

    async fn get(&self, key: &str) -> MailResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> MailResult<()>;

    async fn delete(&self, key: &str) -> MailResult<()>;
}

/// Read a cached credential. Absent and undecodable entries are both a
/// [`MailError::CacheMiss`].
pub async fn get_credential<S: Provider>(
    cache: &dyn CredentialCache,
    key: &str,
) -> MailResult<Credential<S>> {
    let raw = cache
        .get(key)
        .await?
        .ok_or_else(|| MailError::CacheMiss(key.to_string()))?;

    serde_json::from_str(&raw).map_err(|e| MailError::CacheMiss(format!("{key}: {e}")))
}

pub async fn set_credential<S: Provider>(
    cache: &dyn CredentialCache,
    credential: &Credential<S>,
    ttl: Duration,
) -> MailResult<()> {
    let key = credential.cache_key();
    let value = serde_json::to_string(credential)
        .map_err(|e| MailError::Cache(format!("failed to encode {key}: {e}")))?;
    cache.set(&key, value, ttl).await
}

/// Redis backend sharing one multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
}

impl RedisCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CredentialCache for RedisCache {
    async fn exists(&self, key: &str) -> MailResult<bool> {
        let mut conn = self.redis.clone();
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn get(&self, key: &str) -> MailResult<Option<String>> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> MailResult<()> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> MailResult<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// In-memory backend with per-entry expiry (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialCache for InMemoryCache {
    async fn exists(&self, key: &str) -> MailResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn get(&self, key: &str) -> MailResult<Option<String>> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> MailResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> MailResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
