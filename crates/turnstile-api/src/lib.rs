#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! HTTP surface for the Turnstile login gateway.
//!
//! Layout: `http/router.rs` (`ApiServer` and middleware stack), `http/login.rs`
//! (`POST /login`, `GET /version`), `http/health.rs` (`/health`, `/metrics`),
//! `http/errors.rs` (problem responses), `state.rs` (handler dependencies),
//! `error.rs` (server host errors).

pub mod error;
pub mod http;
pub mod models;
pub mod state;

pub use error::ApiServerError;
pub use http::router::ApiServer;
pub use models::{HealthResponse, LoginRequest, LoginResponse, ProblemDetails};
pub use state::ApiState;
