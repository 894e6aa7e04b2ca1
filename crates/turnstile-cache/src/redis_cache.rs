//! Redis-backed cache using a self-reconnecting connection manager.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde_json::Value;

use crate::KeyValueCache;
use crate::error::{CacheError, CacheResult};

/// Cache backed by a redis server.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to the redis server at `url` (`redis://` or `rediss://`).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connect`] when the URL is invalid or the initial
    /// connection cannot be established.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(|source| CacheError::Connect { source })?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|source| CacheError::Connect { source })?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get_json(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await.map_err(backend_err("GET"))?;
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|source| CacheError::Serde {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    async fn set_json(&self, key: &str, value: &Value, ttl: Option<Duration>) -> CacheResult<()> {
        let json = serde_json::to_string(value).map_err(|source| CacheError::Serde {
            key: key.to_string(),
            source,
        })?;
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let seconds = ttl.as_secs().max(1);
                let () = conn
                    .set_ex(key, json, seconds)
                    .await
                    .map_err(backend_err("SETEX"))?;
            }
            None => {
                let () = conn.set(key, json).await.map_err(backend_err("SET"))?;
            }
        }
        tracing::debug!(key, "cached value");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await.map_err(backend_err("DEL"))?;
        Ok(())
    }
}

fn backend_err(operation: &'static str) -> impl FnOnce(redis::RedisError) -> CacheError {
    move |source| CacheError::Backend { operation, source }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn non_redis_urls_fail_to_connect() {
        let result = RedisCache::connect("http://cache:6379/").await;
        assert!(matches!(result, Err(CacheError::Connect { .. })));
    }

    #[test]
    fn backend_errors_name_the_command() {
        let source = redis::RedisError::from((redis::ErrorKind::IoError, "connection reset"));
        let err = backend_err("SETEX")(source);
        assert!(matches!(err, CacheError::Backend { operation: "SETEX", .. }));
    }

    #[tokio::test]
    async fn live_server_round_trips_values() -> anyhow::Result<()> {
        let Ok(url) = std::env::var("TURNSTILE_TEST_REDIS_URL") else {
            return Ok(());
        };
        let cache = RedisCache::connect(&url).await?;
        let key = format!(
            "turnstile:test:{}",
            SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos()
        );

        assert_eq!(cache.get_json(&key).await?, None);
        let value = json!({"username": "admin", "role": "admin"});
        cache
            .set_json(&key, &value, Some(Duration::from_secs(30)))
            .await?;
        assert_eq!(cache.get_json(&key).await?, Some(value));
        cache.delete(&key).await?;
        assert_eq!(cache.get_json(&key).await?, None);
        Ok(())
    }
}
