use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Store a short-lived value; a disconnected cache is a no-op, never an
    /// error, since callers treat the cache as advisory.
    pub(crate) async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return;
        };

        if let Err(err) = cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<_, ()>(&mut manager)
            .await
        {
            tracing::debug!(error = %err, key, "Failed to cache value in Redis");
        }
    }

    pub(crate) async fn get(&self, key: &str) -> Option<String> {
        let manager = { self.manager.read().await.clone() };
        let mut manager = manager?;

        match cmd("GET").arg(key).query_async::<_, Option<String>>(&mut manager).await {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(error = %err, key, "Failed to read value from Redis");
                None
            }
        }
    }
}
