//! Error types for cache operations.

use thiserror::Error;

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Connecting to the cache backend failed.
    #[error("failed to connect to cache backend")]
    Connect {
        /// Underlying redis error.
        source: redis::RedisError,
    },
    /// A backend command failed.
    #[error("cache backend command failed")]
    Backend {
        /// Command that failed.
        operation: &'static str,
        /// Underlying redis error.
        source: redis::RedisError,
    },
    /// Encoding or decoding a cached JSON value failed.
    #[error("cache value was not valid json")]
    Serde {
        /// Cache key involved.
        key: String,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}
