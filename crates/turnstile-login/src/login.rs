//! Login orchestration: fetch the user, then check the password.
//!
//! # Design
//! - The directory lookup happens before the password check; a failed lookup
//!   is reported even for credentials that would not have matched.
//! - Errors keep their kind. Classification for callers happens at the edge.
//! - Argon2 verification runs on the blocking pool.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use turnstile_config::{AllowList, ConfigError};

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::context::CallContext;
use crate::directory::{UserClientError, UserDirectory};
use crate::model::User;

/// Failures raised by [`LoginService::login`].
#[derive(Debug, Error)]
pub enum LoginError {
    /// The username/password pair is not allow-listed.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The breaker rejected the directory call.
    #[error("users directory circuit is open")]
    CircuitOpen,
    /// The breaker is half-open and its trial budget is in use.
    #[error("users directory circuit is probing")]
    TooManyRequests,
    /// The directory lookup failed.
    #[error("user lookup failed")]
    UserLookup {
        /// Underlying directory error.
        source: UserClientError,
    },
    /// Password verification failed for a reason other than a mismatch.
    #[error("credential verification failed")]
    Credentials {
        /// Underlying configuration error.
        source: ConfigError,
    },
    /// The verification task did not complete.
    #[error("credential verification task failed")]
    Worker {
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

/// Verifies credentials and resolves the caller's user record.
#[derive(Clone)]
pub struct LoginService {
    directory: Arc<dyn UserDirectory>,
    breaker: Option<CircuitBreaker>,
    allow_list: Arc<AllowList>,
}

impl LoginService {
    /// Build a service; pass `None` for `breaker` to call the directory directly.
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        breaker: Option<CircuitBreaker>,
        allow_list: Arc<AllowList>,
    ) -> Self {
        Self {
            directory,
            breaker,
            allow_list,
        }
    }

    /// Breaker protecting directory calls, when enabled.
    #[must_use]
    pub const fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }

    /// Run the login pipeline for one set of credentials.
    ///
    /// # Errors
    ///
    /// Returns the directory failure unchanged in kind, or
    /// [`LoginError::InvalidCredentials`] when the pair is not allow-listed.
    pub async fn login(
        &self,
        ctx: &CallContext,
        username: &str,
        password: &str,
    ) -> Result<User, LoginError> {
        let user = self.fetch(ctx, username).await?;

        let allow_list = Arc::clone(&self.allow_list);
        let (name, secret) = (username.to_string(), password.to_string());
        let allowed = tokio::task::spawn_blocking(move || allow_list.verify(&name, &secret))
            .await
            .map_err(|source| LoginError::Worker { source })?
            .map_err(|source| LoginError::Credentials { source })?;
        if !allowed {
            debug!(username, "credentials rejected");
            return Err(LoginError::InvalidCredentials);
        }
        Ok(user)
    }

    async fn fetch(&self, ctx: &CallContext, username: &str) -> Result<User, LoginError> {
        let Some(breaker) = &self.breaker else {
            return self
                .directory
                .fetch_user(ctx, username)
                .await
                .map_err(|source| LoginError::UserLookup { source });
        };
        breaker
            .call(|| self.directory.fetch_user(ctx, username))
            .await
            .map_err(|err| match err {
                BreakerError::Open => LoginError::CircuitOpen,
                BreakerError::TooManyRequests => LoginError::TooManyRequests,
                BreakerError::Inner(source) => LoginError::UserLookup { source },
            })
    }
}
