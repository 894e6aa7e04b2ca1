//! Request and response bodies for the HTTP surface.

use serde::{Deserialize, Serialize};
use turnstile_telemetry::MetricsSnapshot;

/// RFC9457 problem document returned for every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary of the problem class.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Caller-facing explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Body of `POST /login`. Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Plaintext password.
    #[serde(default)]
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Signed session token.
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Users-directory breaker state, or `disabled`.
    pub breaker: &'static str,
    /// Build identifier.
    pub build: String,
    /// Login counters since start.
    pub logins: MetricsSnapshot,
}
