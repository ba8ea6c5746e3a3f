//! Shared remote tier.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use crate::application::repos::CacheError;
use crate::infra::error::InfraError;

/// String key/value store shared between service instances.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// Redis-backed remote tier using an auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, InfraError> {
        let client = Client::open(url)
            .map_err(|err| InfraError::redis("invalid url", err))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| InfraError::redis("connection failed", err))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|err| CacheError::remote(format!("redis GET failed: {err}")))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|err| CacheError::remote(format!("redis SET EX failed: {err}")))
    }
}
