//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges relevant to the login gateway only.

use std::sync::Arc;

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Login outcome label for successful logins.
pub const OUTCOME_SUCCESS: &str = "success";

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    login_outcomes_total: IntCounterVec,
    breaker_transitions_total: IntCounterVec,
    breaker_state: IntGaugeVec,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Logins that issued a session token.
    pub logins_succeeded: u64,
    /// Logins rejected because of bad credentials.
    pub logins_rejected: u64,
    /// Logins that failed because the user directory was unavailable.
    pub logins_unavailable: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )
        .map_err(collector_err("http_requests_total"))?;
        let login_outcomes_total = IntCounterVec::new(
            Opts::new("login_outcomes_total", "Login attempts by classified outcome"),
            &["outcome"],
        )
        .map_err(collector_err("login_outcomes_total"))?;
        let breaker_transitions_total = IntCounterVec::new(
            Opts::new(
                "breaker_transitions_total",
                "Circuit breaker state transitions",
            ),
            &["breaker", "from", "to"],
        )
        .map_err(collector_err("breaker_transitions_total"))?;
        let breaker_state = IntGaugeVec::new(
            Opts::new(
                "breaker_state",
                "Current circuit breaker state (0 closed, 1 half-open, 2 open)",
            ),
            &["breaker"],
        )
        .map_err(collector_err("breaker_state"))?;

        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(register_err("http_requests_total"))?;
        registry
            .register(Box::new(login_outcomes_total.clone()))
            .map_err(register_err("login_outcomes_total"))?;
        registry
            .register(Box::new(breaker_transitions_total.clone()))
            .map_err(register_err("breaker_transitions_total"))?;
        registry
            .register(Box::new(breaker_state.clone()))
            .map_err(register_err("breaker_state"))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                login_outcomes_total,
                breaker_transitions_total,
                breaker_state,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the login outcome counter.
    pub fn inc_login_outcome(&self, outcome: &str) {
        self.inner
            .login_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a circuit breaker transition and update its state gauge.
    pub fn record_breaker_transition(&self, breaker: &str, from: &str, to: &str) {
        self.inner
            .breaker_transitions_total
            .with_label_values(&[breaker, from, to])
            .inc();
        self.inner
            .breaker_state
            .with_label_values(&[breaker])
            .set(state_gauge_value(to));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the login counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let count = |outcome: &str| {
            self.inner
                .login_outcomes_total
                .with_label_values(&[outcome])
                .get()
        };
        MetricsSnapshot {
            logins_succeeded: count(OUTCOME_SUCCESS),
            logins_rejected: count("bad_credentials"),
            logins_unavailable: count("upstream_timeout")
                + count("circuit_open")
                + count("network_error"),
        }
    }
}

fn state_gauge_value(state: &str) -> i64 {
    match state {
        "half-open" => 1,
        "open" => 2,
        _ => 0,
    }
}

fn collector_err(name: &'static str) -> impl FnOnce(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::MetricsCollector { name, source }
}

fn register_err(name: &'static str) -> impl FnOnce(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::MetricsRegister { name, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_recorded_series() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/login", 200);
        metrics.inc_login_outcome(OUTCOME_SUCCESS);
        metrics.record_breaker_transition("users-api-cb", "closed", "open");

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total{"));
        assert!(rendered.contains("route=\"/login\""));
        assert!(rendered.contains("login_outcomes_total{outcome=\"success\"} 1"));
        assert!(rendered.contains("breaker_state{breaker=\"users-api-cb\"} 2"));
        Ok(())
    }

    #[test]
    fn snapshot_groups_unavailable_outcomes() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_login_outcome("circuit_open");
        metrics.inc_login_outcome("network_error");
        metrics.inc_login_outcome("bad_credentials");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.logins_unavailable, 2);
        assert_eq!(snapshot.logins_rejected, 1);
        assert_eq!(snapshot.logins_succeeded, 0);
        Ok(())
    }
}
