//! Router construction and server host for the API.

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderValue, Method, Request,
        header::{
            AUTHORIZATION, CONTENT_TYPE, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, warn};
use turnstile_telemetry::build_sha;

use crate::error::ApiServerError;
use crate::http::constants::{
    HEADER_REQUEST_ID, SECURITY_CONTENT_TYPE_OPTIONS, SECURITY_FRAME_OPTIONS, SECURITY_HSTS,
    SECURITY_XSS_PROTECTION,
};
use crate::http::errors::ApiError;
use crate::http::health::{health, metrics};
use crate::http::login::{login, version};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper that hosts the gateway's HTTP surface.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router with the full middleware stack.
    #[must_use]
    pub fn new(state: ApiState, cors_allowed_origins: &[String]) -> Self {
        let telemetry = state.telemetry.clone();
        let state = Arc::new(state);

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(|response: &Response, latency: Duration, span: &Span| {
                span.record("status_code", response.status().as_u16());
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                span.record("latency_ms", latency_ms);
            });
        let layered = ServiceBuilder::new()
            .layer(turnstile_telemetry::set_request_id_layer())
            .layer(turnstile_telemetry::propagate_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Router::new()
            .route("/login", post(login))
            .route("/version", get(version))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .with_state(state)
            .route_layer(layered)
            .layer(CatchPanicLayer::custom(handle_panic));
        let router = with_security_headers(router).layer(cors_layer(cors_allowed_origins));

        Self { router }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] if the listener cannot bind, or
    /// [`ApiServerError::Serve`] if the server loop fails.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<(), ApiServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        tracing::info!(addr = %addr, "auth gateway listening");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    /// Router with every layer applied, for embedding or in-process tests.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

fn with_security_headers(router: Router) -> Router {
    [
        (X_XSS_PROTECTION, SECURITY_XSS_PROTECTION),
        (X_CONTENT_TYPE_OPTIONS, SECURITY_CONTENT_TYPE_OPTIONS),
        (X_FRAME_OPTIONS, SECURITY_FRAME_OPTIONS),
        (STRICT_TRANSPORT_SECURITY, SECURITY_HSTS),
    ]
    .into_iter()
    .fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ))
    })
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(panic = %detail, "handler panicked");
    ApiError::internal("something went wrong, please try again later").into_response()
}
