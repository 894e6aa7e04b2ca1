//! # Design
//!
//! - Centralize application-level errors for bootstrap and serving.
//! - Keep error messages constant while carrying the failing operation.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading or credential preparation failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: turnstile_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: turnstile_telemetry::TelemetryError,
    },
    /// Token minter construction failed.
    #[error("token operation failed")]
    Token {
        /// Operation identifier.
        operation: &'static str,
        /// Source token error.
        source: turnstile_login::TokenError,
    },
    /// User directory client construction failed.
    #[error("user directory operation failed")]
    UserDirectory {
        /// Operation identifier.
        operation: &'static str,
        /// Source client error.
        source: turnstile_login::UserClientError,
    },
    /// Cache backend setup failed.
    #[error("cache operation failed")]
    Cache {
        /// Operation identifier.
        operation: &'static str,
        /// Source cache error.
        source: turnstile_cache::CacheError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: turnstile_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: turnstile_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: turnstile_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn token(operation: &'static str, source: turnstile_login::TokenError) -> Self {
        Self::Token { operation, source }
    }

    pub(crate) const fn user_directory(
        operation: &'static str,
        source: turnstile_login::UserClientError,
    ) -> Self {
        Self::UserDirectory { operation, source }
    }

    pub(crate) const fn cache(operation: &'static str, source: turnstile_cache::CacheError) -> Self {
        Self::Cache { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: turnstile_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}
