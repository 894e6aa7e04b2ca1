use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};
use turnstile_api::{ApiServer, ApiState};
use turnstile_cache::RedisCache;
use turnstile_config::{AllowList, BreakerConfig, CredentialSource, GatewayConfig, LogConfig};
use turnstile_login::{
    BreakerSettings, BreakerState, CachedUserDirectory, CircuitBreaker, HttpUserDirectory,
    LoginService, TokenMinter, UserDirectory,
};
use turnstile_telemetry::{LogFormat, LoggingConfig, Metrics};

use crate::error::{AppError, AppResult};

/// Build identifier stamped into logs and `/health`; set at compile time.
const BUILD_SHA: &str = match option_env!("TURNSTILE_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Fully wired HTTP surface plus the handles bootstrap keeps for logging.
pub(crate) struct Gateway {
    server: ApiServer,
    breaker: Option<CircuitBreaker>,
}

/// Entry point for the gateway boot sequence.
///
/// # Errors
///
/// Returns an error if configuration is invalid, logging cannot be installed,
/// a dependency fails to build, or the listener fails.
pub async fn run_app() -> AppResult<()> {
    let config =
        GatewayConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
    turnstile_telemetry::init_logging(&logging_config(&config.logging))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let telemetry = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    run_app_with(config, telemetry, shutdown_signal()).await
}

/// Boot sequence over injected configuration and shutdown trigger.
pub(crate) async fn run_app_with<F>(
    config: GatewayConfig,
    telemetry: Metrics,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(build_sha = BUILD_SHA, "turnstile bootstrap starting");
    for setting in &config.ignored_settings {
        warn!(setting = %setting, "configuration value is ignored");
    }

    let gateway = build_gateway(&config, telemetry).await?;
    info!(
        addr = %config.bind_addr,
        users_api = %config.users_api,
        breaker = gateway.breaker.as_ref().map_or("disabled", CircuitBreaker::name),
        "launching API listener"
    );

    gateway
        .server
        .serve(config.bind_addr, shutdown)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

/// Assemble the login pipeline and HTTP surface from configuration.
pub(crate) async fn build_gateway(config: &GatewayConfig, telemetry: Metrics) -> AppResult<Gateway> {
    if matches!(config.credentials, CredentialSource::Demo) {
        warn!("AUTH_API_CREDENTIALS not set; using built-in demo credentials");
    }
    let allow_list = AllowList::from_source(&config.credentials)
        .map_err(|err| AppError::config("allow_list.build", err))?;
    info!(entries = allow_list.len(), "credential allow-list ready");

    let minter = Arc::new(
        TokenMinter::new(config.jwt_secret.expose())
            .map_err(|err| AppError::token("token_minter.new", err))?,
    );
    let http = HttpUserDirectory::new(
        config.users_api.clone(),
        Arc::clone(&minter),
        config.request_timeout,
    )
    .map_err(|err| AppError::user_directory("user_directory.new", err))?;

    let directory: Arc<dyn UserDirectory> = match &config.user_cache {
        Some(cache) => {
            let url = cache
                .redis
                .connection_url()
                .map_err(|err| AppError::config("redis.connection_url", err))?;
            let backend = RedisCache::connect(&url)
                .await
                .map_err(|err| AppError::cache("redis.connect", err))?;
            info!(
                host = %cache.redis.host,
                port = cache.redis.port,
                ttl_secs = cache.ttl.as_secs(),
                "user cache enabled"
            );
            Arc::new(CachedUserDirectory::new(
                Arc::new(http),
                Arc::new(backend),
                cache.ttl,
            ))
        }
        None => Arc::new(http),
    };

    let breaker = config
        .breaker
        .as_ref()
        .map(|settings| instrumented_breaker(settings, &telemetry));
    let login = LoginService::new(directory, breaker.clone(), Arc::new(allow_list));
    let state = ApiState::new(login, minter, telemetry, config.login_timeout);
    let server = ApiServer::new(state, &config.cors_allowed_origins);
    Ok(Gateway { server, breaker })
}

fn instrumented_breaker(config: &BreakerConfig, telemetry: &Metrics) -> CircuitBreaker {
    let breaker = CircuitBreaker::new(BreakerSettings::from(config));
    let metrics = telemetry.clone();
    breaker.on_transition(Arc::new(move |name: &str, from: BreakerState, to: BreakerState| {
        info!(name = %name, from = %from, to = %to, "circuit-breaker state change");
        metrics.record_breaker_transition(name, from.as_str(), to.as_str());
    }));
    breaker
}

fn logging_config(config: &LogConfig) -> LoggingConfig<'_> {
    LoggingConfig {
        level: &config.level,
        format: config
            .format
            .as_deref()
            .map_or_else(LogFormat::infer, LogFormat::from_name),
        build_sha: BUILD_SHA,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use turnstile_config::{HashParams, hash_secret};
    use turnstile_login::BreakerError;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<GatewayConfig> {
        let params = HashParams::new(256, 1, 1, None).map_err(|err| anyhow::anyhow!("{err}"))?;
        let mut env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        env.insert("JWT_SECRET".into(), "bootstrap-secret".into());
        env.insert(
            "AUTH_API_CREDENTIALS".into(),
            format!("admin:{}", hash_secret("admin", params)?),
        );
        Ok(GatewayConfig::from_lookup(|key| env.get(key).cloned())?)
    }

    #[tokio::test]
    async fn breaker_is_absent_unless_enabled() -> anyhow::Result<()> {
        let config = config_from(&[])?;
        let gateway = build_gateway(&config, Metrics::new()?).await?;
        assert!(gateway.breaker.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn breaker_transitions_reach_metrics() -> anyhow::Result<()> {
        let config = config_from(&[("CB_ENABLED", "true"), ("CB_ERROR_THRESHOLD", "1")])?;
        let metrics = Metrics::new()?;
        let gateway = build_gateway(&config, metrics.clone()).await?;
        let breaker = gateway
            .breaker
            .ok_or_else(|| anyhow::anyhow!("breaker should be enabled"))?;
        assert_eq!(breaker.name(), "users-api-cb");

        let outcome: Result<(), BreakerError<&str>> = breaker.call(|| async { Err("down") }).await;
        assert!(matches!(outcome, Err(BreakerError::Inner("down"))));
        assert_eq!(breaker.state(), BreakerState::Open);

        let rendered = metrics.render()?;
        assert!(rendered.contains("breaker_transitions_total"));
        assert!(rendered.contains("to=\"open\""));
        Ok(())
    }

    #[tokio::test]
    async fn users_api_with_a_base_path_builds() -> anyhow::Result<()> {
        let config = config_from(&[("USERS_API_ADDRESS", "http://users.internal:8083/api/")])?;
        build_gateway(&config, Metrics::new()?).await?;
        Ok(())
    }

    #[test]
    fn logging_config_honours_explicit_format() {
        let config = LogConfig {
            level: "debug".to_string(),
            format: Some("json".to_string()),
        };
        let logging = logging_config(&config);
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);
        assert_eq!(logging.build_sha, BUILD_SHA);

        let defaults = LogConfig {
            level: "info".to_string(),
            format: None,
        };
        let inferred = logging_config(&defaults);
        assert_eq!(inferred.format, LogFormat::infer());
    }

    #[tokio::test]
    async fn serve_stops_when_shutdown_resolves() -> anyhow::Result<()> {
        let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
        let config = config_from(&[
            ("AUTH_API_BIND", "127.0.0.1"),
            ("AUTH_API_PORT", &port.to_string()),
        ])?;
        run_app_with(config, Metrics::new()?, async {}).await?;
        Ok(())
    }
}
