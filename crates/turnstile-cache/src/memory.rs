//! In-process cache with lazy expiry, for tests and single-node development.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::KeyValueCache;
use crate::error::CacheResult;

/// Cache holding JSON values in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including ones that expired but were not yet read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get_json(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let expired = entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .is_some_and(|deadline| Instant::now() >= deadline);
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_json(&self, key: &str, value: &Value, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = Entry {
            value: value.clone(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn miss_is_distinct_from_hit() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        assert_eq!(cache.get_json("absent").await?, None);

        cache.set_json("k", &json!({"a": 1}), None).await?;
        assert_eq!(cache.get_json("k").await?, Some(json!({"a": 1})));

        cache.delete("k").await?;
        assert_eq!(cache.get_json("k").await?, None);
        assert!(cache.is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache
            .set_json("k", &json!("v"), Some(Duration::from_secs(5)))
            .await?;

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get_json("k").await?, Some(json!("v")));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get_json("k").await?, None);
        assert!(cache.is_empty());
        Ok(())
    }
}
