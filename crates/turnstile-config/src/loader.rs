//! Environment-driven configuration loader.
//!
//! # Design
//! - Reads through a lookup function so tests never touch process state.
//! - Empty values are treated as unset.
//! - Fails fast on the first invalid value; defaults fill everything optional.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::credentials::{CredentialSource, parse_credential_list};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    BreakerConfig, GatewayConfig, LogConfig, RedisConfig, SigningSecret, USERS_BREAKER_NAME,
    UserCacheConfig,
};
use crate::validate::{
    parse_base_url, parse_flag, parse_ip, parse_millis, parse_origins, parse_port,
    parse_positive_u32, parse_secs,
};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;
/// Default downstream user directory address.
pub const DEFAULT_USERS_API: &str = "http://127.0.0.1:8083";
/// Default consecutive-failure threshold.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default open-state cool-down.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Legacy cool-down used only when the reset timeout is explicitly zero.
pub const DEFAULT_LEGACY_TIMEOUT: Duration = Duration::from_millis(2_000);
/// Default per-call downstream timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1_500);
/// Default half-open trial budget.
pub const DEFAULT_HALF_OPEN_MAX_CALLS: u32 = 1;
/// Default redis port when only a host is supplied.
pub const DEFAULT_REDIS_PORT: u16 = 6379;
/// Default CORS origins.
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:8080,http://127.0.0.1:8080";

const DEFAULT_LOG_LEVEL: &str = "info";

impl GatewayConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first variable that is missing or
    /// invalid.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first variable that is missing or
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let mut ignored_settings = Vec::new();

        let ip = env
            .get("AUTH_API_BIND")
            .map(|raw| parse_ip("AUTH_API_BIND", &raw))
            .transpose()?
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = env
            .get("AUTH_API_PORT")
            .map(|raw| parse_port("AUTH_API_PORT", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);

        let users_api = parse_base_url(
            "USERS_API_ADDRESS",
            &env.get("USERS_API_ADDRESS")
                .unwrap_or_else(|| DEFAULT_USERS_API.to_string()),
        )?;

        let jwt_secret = env
            .get_secret("JWT_SECRET")
            .map(SigningSecret::new)
            .ok_or(ConfigError::MissingField {
                field: "JWT_SECRET",
            })?;

        let credentials = match env.get("AUTH_API_CREDENTIALS") {
            Some(raw) => {
                let entries = parse_credential_list(&raw)?;
                if entries.is_empty() {
                    return Err(ConfigError::InvalidField {
                        field: "AUTH_API_CREDENTIALS",
                        value: None,
                        reason: "no_entries",
                    });
                }
                CredentialSource::Hashed(entries)
            }
            None => CredentialSource::Demo,
        };

        let login_timeout = env
            .get("AUTH_API_LOGIN_TIMEOUT_MS")
            .map(|raw| parse_millis("AUTH_API_LOGIN_TIMEOUT_MS", &raw))
            .transpose()?
            .filter(|timeout| !timeout.is_zero());

        let request_timeout = Some(
            env.get("CB_REQUEST_TIMEOUT_MS")
                .map(|raw| parse_millis("CB_REQUEST_TIMEOUT_MS", &raw))
                .transpose()?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        )
        .filter(|timeout| !timeout.is_zero());

        let breaker_enabled = env
            .get("CB_ENABLED")
            .map(|raw| parse_flag("CB_ENABLED", &raw))
            .transpose()?
            .unwrap_or(false);
        let breaker = if breaker_enabled {
            Some(load_breaker(&env, &mut ignored_settings)?)
        } else {
            None
        };

        let cors_allowed_origins = parse_origins(
            &env.get("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()),
        );

        let user_cache = load_user_cache(&env)?;

        let logging = LogConfig {
            level: env
                .get("AUTH_API_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            format: env.get("AUTH_API_LOG_FORMAT"),
        };

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            users_api,
            jwt_secret,
            credentials,
            login_timeout,
            request_timeout,
            breaker,
            cors_allowed_origins,
            user_cache,
            logging,
            ignored_settings,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Secrets keep surrounding whitespace; blank values count as unset.
    fn get_secret(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }
}

fn load_breaker<F>(env: &Env<F>, ignored: &mut Vec<&'static str>) -> ConfigResult<BreakerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let failure_threshold = env
        .get("CB_ERROR_THRESHOLD")
        .map(|raw| parse_positive_u32("CB_ERROR_THRESHOLD", &raw))
        .transpose()?
        .unwrap_or(DEFAULT_FAILURE_THRESHOLD);
    let half_open_max_calls = env
        .get("CB_HALF_OPEN_MAX_REQUESTS")
        .map(|raw| parse_positive_u32("CB_HALF_OPEN_MAX_REQUESTS", &raw))
        .transpose()?
        .unwrap_or(DEFAULT_HALF_OPEN_MAX_CALLS);

    let reset = env
        .get("CB_RESET_TIMEOUT_MS")
        .map(|raw| parse_millis("CB_RESET_TIMEOUT_MS", &raw))
        .transpose()?
        .unwrap_or(DEFAULT_RESET_TIMEOUT);
    let legacy_raw = env.get("CB_TIMEOUT_MS");
    let cooldown = if reset.is_zero() {
        let legacy = legacy_raw
            .as_deref()
            .map(|raw| parse_millis("CB_TIMEOUT_MS", raw))
            .transpose()?
            .unwrap_or(DEFAULT_LEGACY_TIMEOUT);
        if legacy.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "CB_TIMEOUT_MS",
                value: legacy_raw,
                reason: "cooldown_must_be_positive",
            });
        }
        legacy
    } else {
        if legacy_raw.is_some() {
            ignored.push("CB_TIMEOUT_MS");
        }
        reset
    };

    Ok(BreakerConfig {
        name: USERS_BREAKER_NAME.to_string(),
        failure_threshold,
        cooldown,
        half_open_max_calls,
    })
}

fn load_user_cache<F>(env: &Env<F>) -> ConfigResult<Option<UserCacheConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let ttl = env
        .get("USER_CACHE_TTL_SECS")
        .map(|raw| parse_secs("USER_CACHE_TTL_SECS", &raw))
        .transpose()?
        .unwrap_or(Duration::ZERO);
    if ttl.is_zero() {
        return Ok(None);
    }
    let host = env.get("REDIS_HOST").ok_or(ConfigError::MissingField {
        field: "REDIS_HOST",
    })?;
    let port = env
        .get("REDIS_PORT")
        .map(|raw| parse_port("REDIS_PORT", &raw))
        .transpose()?
        .unwrap_or(DEFAULT_REDIS_PORT);
    let redis = RedisConfig {
        host,
        port,
        password: env.get_secret("REDIS_KEY"),
    };
    redis.connection_url()?;
    Ok(Some(UserCacheConfig { ttl, redis }))
}
