#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Key-value cache abstraction storing JSON values.
//!
//! Layout: `redis_cache.rs` (redis backend), `memory.rs` (in-process
//! backend), `error.rs` (cache errors). A miss is `Ok(None)`, never an error.

pub mod error;
pub mod memory;
pub mod redis_cache;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

/// Storage for JSON values keyed by string.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Fetch the value stored under `key`; `Ok(None)` on a miss.
    async fn get_json(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Store `value` under `key`, expiring after `ttl` when given.
    async fn set_json(&self, key: &str, value: &Value, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove `key`; absent keys are not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Fetch and decode a typed value.
///
/// # Errors
///
/// Propagates backend failures and reports values that do not decode as `T`.
pub async fn get_typed<T>(cache: &dyn KeyValueCache, key: &str) -> CacheResult<Option<T>>
where
    T: DeserializeOwned,
{
    cache
        .get_json(key)
        .await?
        .map(|value| {
            serde_json::from_value(value).map_err(|source| CacheError::Serde {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
}

/// Encode and store a typed value.
///
/// # Errors
///
/// Propagates backend failures and reports values that cannot be encoded.
pub async fn set_typed<T>(
    cache: &dyn KeyValueCache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> CacheResult<()>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value).map_err(|source| CacheError::Serde {
        key: key.to_string(),
        source,
    })?;
    cache.set_json(key, &value, ttl).await
}
