//! # Metrics Collection
//!
//! Prometheus metrics for the onboarding flow.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use ::tracing::{info, warn};
use metrics::{counter, describe_counter, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: f64) {
        let labels = [("method", method.to_string()), ("path", path.to_string())];
        counter!("http_requests_total", &labels).increment(1);
        histogram!("http_request_duration_seconds").record(duration);

        let status_label = [("status", status.to_string())];
        counter!("http_responses_total", &status_label).increment(1);
    }

    pub fn record_token_issued(&self, kind: &str) {
        counter!("provisioning_tokens_issued_total", "kind" => kind.to_string()).increment(1);
    }

    pub fn record_token_consumed(&self, kind: &str) {
        counter!("provisioning_tokens_consumed_total", "kind" => kind.to_string()).increment(1);
    }

    /// Record a token that was missing, expired, of the wrong kind, or lost a race
    pub fn record_token_rejected(&self, reason: &str) {
        counter!("provisioning_tokens_rejected_total", "reason" => reason.to_string()).increment(1);
    }

    pub fn record_tokens_purged(&self, count: usize) {
        counter!("provisioning_tokens_purged_total").increment(count as u64);
    }

    pub fn set_live_tokens(&self, count: usize) {
        gauge!("provisioning_tokens_live").set(count as f64);
    }

    pub fn record_certificate_issued(&self, kind: &str, renewal: bool) {
        let flow = if renewal { "renewal" } else { "initial" };
        let labels = [("kind", kind.to_string()), ("flow", flow.to_string())];
        counter!("certificates_issued_total", &labels).increment(1);
    }

    /// Record a CSR rejected before signing
    pub fn record_csr_rejected(&self, reason: &str) {
        counter!("csr_rejections_total", "reason" => reason.to_string()).increment(1);
    }

    /// Register baseline metrics so Prometheus exports appear before events occur.
    pub fn register_provisioning_metrics(&self) {
        describe_counter!(
            "provisioning_tokens_issued_total",
            Unit::Count,
            "Provisioning tokens issued grouped by identity kind"
        );
        describe_counter!(
            "provisioning_tokens_consumed_total",
            Unit::Count,
            "Provisioning tokens consumed by a successful signing"
        );
        describe_counter!(
            "provisioning_tokens_rejected_total",
            Unit::Count,
            "Requests presenting an unusable provisioning token"
        );
        describe_counter!(
            "provisioning_tokens_purged_total",
            Unit::Count,
            "Expired provisioning tokens removed by the purge task"
        );
        describe_counter!(
            "certificates_issued_total",
            Unit::Count,
            "Client certificates signed grouped by kind and flow"
        );
        describe_counter!("csr_rejections_total", Unit::Count, "CSRs rejected before signing");
        describe_histogram!(
            "http_request_duration_seconds",
            Unit::Seconds,
            "Duration of HTTP requests"
        );

        for kind in ["application", "cluster"] {
            counter!("provisioning_tokens_issued_total", "kind" => kind).absolute(0);
            counter!("provisioning_tokens_consumed_total", "kind" => kind).absolute(0);
        }
        counter!("provisioning_tokens_purged_total").absolute(0);
        gauge!("provisioning_tokens_live").set(0.0);
    }
}

static METRICS: OnceCell<MetricsRecorder> = OnceCell::new();

/// Initialize metrics collection and Prometheus exporter
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        Error::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    let recorder = METRICS.get_or_init(MetricsRecorder::new);
    recorder.register_provisioning_metrics();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Metrics collection initialized"
    );

    Ok(())
}

/// Get the global metrics recorder
pub fn get_metrics() -> Option<&'static MetricsRecorder> {
    METRICS.get()
}

/// Record an HTTP request using the global metrics recorder
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    if let Some(metrics) = get_metrics() {
        metrics.record_http_request(method, path, status, duration);
    }
}

pub fn record_token_issued(kind: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_token_issued(kind);
    }
}

pub fn record_token_consumed(kind: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_token_consumed(kind);
    }
}

pub fn record_token_rejected(reason: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_token_rejected(reason);
    }
}

/// Record a purge run via the global recorder
pub fn record_tokens_purged(count: usize, remaining: usize) {
    if let Some(metrics) = get_metrics() {
        metrics.record_tokens_purged(count);
        metrics.set_live_tokens(remaining);
    }
}

pub fn record_certificate_issued(kind: &str, renewal: bool) {
    if let Some(metrics) = get_metrics() {
        metrics.record_certificate_issued(kind, renewal);
    }
}

pub fn record_csr_rejected(reason: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.record_csr_rejected(reason);
    }
}
