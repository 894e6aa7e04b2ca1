#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Environment-backed configuration for the Turnstile gateway.
//!
//! Layout: `model.rs` (typed config models), `loader.rs` (environment
//! loading and defaults), `validate.rs` (value parsing helpers),
//! `credentials.rs` (argon2 allow-list).

pub mod credentials;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use credentials::{
    AllowList, CredentialEntry, CredentialSource, DEMO_CREDENTIALS, hash_secret,
    parse_credential_list,
};
pub use error::{ConfigError, ConfigResult};
pub use model::{
    BreakerConfig, GatewayConfig, LogConfig, RedisConfig, SigningSecret, USERS_BREAKER_NAME,
    UserCacheConfig,
};

/// Argon2 cost parameters, re-exported for callers building allow-lists.
pub use argon2::Params as HashParams;
