//! Read-through cache in front of a [`UserDirectory`].
//!
//! Cache trouble never fails a lookup: read and write errors are logged and
//! the wrapped directory is used as if the entry were missing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use turnstile_cache::{KeyValueCache, get_typed, set_typed};

use crate::context::CallContext;
use crate::directory::{UserClientError, UserDirectory};
use crate::model::User;

const KEY_PREFIX: &str = "turnstile:user:";

/// Directory that consults a cache before delegating.
pub struct CachedUserDirectory {
    inner: Arc<dyn UserDirectory>,
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl CachedUserDirectory {
    /// Wrap `inner`, caching successful lookups for `ttl`.
    #[must_use]
    pub fn new(inner: Arc<dyn UserDirectory>, cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    fn key(username: &str) -> String {
        format!("{KEY_PREFIX}{username}")
    }
}

#[async_trait]
impl UserDirectory for CachedUserDirectory {
    async fn fetch_user(&self, ctx: &CallContext, username: &str) -> Result<User, UserClientError> {
        let key = Self::key(username);
        match get_typed::<User>(self.cache.as_ref(), &key).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(err) => warn!(error = %err, key = %key, "user cache read failed"),
        }

        let user = self.inner.fetch_user(ctx, username).await?;
        if let Err(err) = set_typed(self.cache.as_ref(), &key, &user, Some(self.ttl)).await {
            warn!(error = %err, key = %key, "user cache write failed");
        }
        Ok(user)
    }
}
