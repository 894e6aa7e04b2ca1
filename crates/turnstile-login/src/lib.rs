#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Resilient login pipeline for the Turnstile gateway.
//!
//! Layout: `tokens.rs` (HS256 minting), `directory.rs` (downstream user
//! lookups), `breaker.rs` (generic circuit breaker), `login.rs` (orchestration),
//! `classify.rs` (caller-facing failure classes), `cached.rs` (optional
//! read-through user cache), `context.rs` (deadline propagation).

pub mod breaker;
pub mod cached;
pub mod classify;
pub mod context;
pub mod directory;
pub mod login;
pub mod model;
pub mod tokens;

pub use breaker::{BreakerError, BreakerSettings, BreakerState, CircuitBreaker, TransitionListener};
pub use cached::CachedUserDirectory;
pub use classify::{FailureClass, classify};
pub use context::CallContext;
pub use directory::{HttpUserDirectory, UserClientError, UserDirectory};
pub use login::{LoginError, LoginService};
pub use model::User;
pub use tokens::{SERVICE_SCOPE, ServiceClaims, SessionClaims, TokenError, TokenMinter};
