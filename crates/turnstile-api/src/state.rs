//! Shared state handed to every handler.

use std::sync::Arc;
use std::time::Duration;

use turnstile_login::{CallContext, LoginService, TokenMinter};
use turnstile_telemetry::Metrics;

/// Dependencies for the HTTP surface.
#[derive(Clone)]
pub struct ApiState {
    pub(crate) login: LoginService,
    pub(crate) minter: Arc<TokenMinter>,
    pub(crate) telemetry: Metrics,
    pub(crate) login_timeout: Option<Duration>,
}

impl ApiState {
    /// Bundle the login pipeline, token minter, and metrics handle.
    #[must_use]
    pub fn new(
        login: LoginService,
        minter: Arc<TokenMinter>,
        telemetry: Metrics,
        login_timeout: Option<Duration>,
    ) -> Self {
        Self {
            login,
            minter,
            telemetry,
            login_timeout,
        }
    }

    pub(crate) fn call_context(&self) -> CallContext {
        self.login_timeout
            .map_or_else(CallContext::background, CallContext::with_timeout)
    }
}
