//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use turnstile_login::FailureClass;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_SERVICE_UNAVAILABLE, PROBLEM_UNAUTHORIZED,
};
use crate::models::ProblemDetails;

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication failed",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }

    /// Render a classified login failure.
    pub(crate) fn from_failure(class: FailureClass) -> Self {
        match class {
            FailureClass::UpstreamTimeout
            | FailureClass::CircuitOpen
            | FailureClass::NetworkError => Self::service_unavailable(class.message()),
            FailureClass::BadCredentials => Self::unauthorized(class.message()),
            FailureClass::Internal => Self::internal(class.message()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classes_render_expected_statuses() {
        let cases = [
            (FailureClass::UpstreamTimeout, StatusCode::SERVICE_UNAVAILABLE),
            (FailureClass::CircuitOpen, StatusCode::SERVICE_UNAVAILABLE),
            (FailureClass::NetworkError, StatusCode::SERVICE_UNAVAILABLE),
            (FailureClass::BadCredentials, StatusCode::UNAUTHORIZED),
            (FailureClass::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (class, status) in cases {
            let err = ApiError::from_failure(class);
            assert_eq!(err.status, status);
            assert_eq!(err.status.as_u16(), class.status_code());
            assert_eq!(err.detail.as_deref(), Some(class.message()));
        }
    }

    #[test]
    fn into_response_keeps_status() {
        let response = ApiError::bad_request("Invalid request body").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::bad_request("x").kind, PROBLEM_BAD_REQUEST);
    }
}
