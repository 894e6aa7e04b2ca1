//! Typed configuration models for the gateway.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::credentials::CredentialSource;
use crate::error::{ConfigError, ConfigResult};

/// Name reported by the users-directory circuit breaker.
pub const USERS_BREAKER_NAME: &str = "users-api-cb";

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// Base address of the downstream user directory.
    pub users_api: Url,
    /// Key used to sign service and session tokens.
    pub jwt_secret: SigningSecret,
    /// Source of the login allow-list.
    pub credentials: CredentialSource,
    /// Overall deadline applied to each login, if any.
    pub login_timeout: Option<Duration>,
    /// Per-call timeout for downstream user lookups, if any.
    pub request_timeout: Option<Duration>,
    /// Circuit breaker settings; `None` when the breaker is disabled.
    pub breaker: Option<BreakerConfig>,
    /// Origins allowed by the CORS layer.
    pub cors_allowed_origins: Vec<String>,
    /// Read-through user cache; `None` when disabled.
    pub user_cache: Option<UserCacheConfig>,
    /// Logging preferences.
    pub logging: LogConfig,
    /// Environment variables that were set but ignored.
    pub ignored_settings: Vec<&'static str>,
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Breaker name used in logs and metrics.
    pub name: String,
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// Time spent open before trial calls are admitted.
    pub cooldown: Duration,
    /// Concurrent trial calls admitted while half-open.
    pub half_open_max_calls: u32,
}

/// Read-through cache settings for downstream user records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCacheConfig {
    /// Lifetime of cached user entries.
    pub ttl: Duration,
    /// Backing redis instance.
    pub redis: RedisConfig,
}

/// Connection settings for redis.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Redis host name.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Optional password.
    pub password: Option<String>,
}

impl RedisConfig {
    /// Connection URL understood by the redis client. The password is
    /// percent-encoded into the userinfo section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the host or password cannot
    /// be carried in a `redis://` URL.
    pub fn connection_url(&self) -> ConfigResult<String> {
        let invalid = |field: &'static str, value: Option<String>| ConfigError::InvalidField {
            field,
            value,
            reason: "not_a_redis_url",
        };
        let mut url = Url::parse("redis://localhost/")
            .map_err(|_| invalid("REDIS_HOST", Some(self.host.clone())))?;
        url.set_host(Some(&self.host))
            .map_err(|_| invalid("REDIS_HOST", Some(self.host.clone())))?;
        url.set_port(Some(self.port))
            .map_err(|()| invalid("REDIS_PORT", Some(self.port.to_string())))?;
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|()| invalid("REDIS_KEY", None))?;
        }
        Ok(url.into())
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Logging preferences resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Requested output format name (`json` or `pretty`).
    pub format: Option<String>,
}

/// Token signing key. Never rendered by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(String);

impl SigningSecret {
    /// Wrap a raw secret.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw key bytes.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}
