//! `POST /login` and `GET /version` handlers.

use std::error::Error as _;
use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use chrono::Utc;
use tracing::{debug, error, info, warn};
use turnstile_login::{FailureClass, classify};
use turnstile_telemetry::metrics::OUTCOME_SUCCESS;

use crate::http::constants::{MSG_FIELDS_REQUIRED, MSG_INVALID_BODY, VERSION_TEXT};
use crate::http::errors::ApiError;
use crate::models::{LoginRequest, LoginResponse};
use crate::state::ApiState;

pub(crate) async fn login(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<LoginResponse>, ApiError> {
    let request: LoginRequest = serde_json::from_slice(&body).map_err(|err| {
        debug!(error = %err, "rejected malformed login body");
        ApiError::bad_request(MSG_INVALID_BODY)
    })?;
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request(MSG_FIELDS_REQUIRED));
    }

    let ctx = state.call_context();
    let user = match state
        .login
        .login(&ctx, &request.username, &request.password)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            let class = classify(&err);
            state.telemetry.inc_login_outcome(class.outcome());
            let cause = err.source().map(ToString::to_string).unwrap_or_default();
            match class {
                FailureClass::Internal => {
                    error!(error = %err, cause = %cause, username = %request.username, "login failed");
                }
                FailureClass::BadCredentials => {
                    info!(username = %request.username, "login rejected");
                }
                _ => {
                    warn!(error = %err, cause = %cause, outcome = class.outcome(), "users service unavailable");
                }
            }
            return Err(ApiError::from_failure(class));
        }
    };

    let access_token = state
        .minter
        .mint_session_token(&user, Utc::now())
        .map_err(|err| {
            error!(error = %err, "failed to mint session token");
            state
                .telemetry
                .inc_login_outcome(FailureClass::Internal.outcome());
            ApiError::from_failure(FailureClass::Internal)
        })?;

    state.telemetry.inc_login_outcome(OUTCOME_SUCCESS);
    info!(username = %user.username, role = %user.role, "login succeeded");
    Ok(Json(LoginResponse { access_token }))
}

pub(crate) async fn version() -> &'static str {
    VERSION_TEXT
}
