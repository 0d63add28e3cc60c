//! # Structured Logging
//!
//! Subscriber setup plus span macros used across the HTTP layer.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("POST", "/v1/applications/certificates", kind = "application");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            identity = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            identity = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Returns false when a subscriber was already installed (tests, embedding).
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logging {
        registry.with(tracing_subscriber::fmt::layer().json().with_current_span(true)).try_init().is_ok()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init().is_ok()
    }
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        internal_address = %config.server.internal_bind_address(),
        external_address = %config.server.external_bind_address(),
        multi_tenant = %config.identity.multi_tenant,
        validity_days = config.certificate.validity_days,
        application_token_ttl = config.tokens.application_ttl_seconds,
        cluster_token_ttl = config.tokens.cluster_ttl_seconds,
        gateway_configured = config.urls.gateway_base_url.is_some(),
        "certbridge configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = request_span!("GET", "/v1/health");
        let _span = request_span!("POST", "/v1/applications/certificates", kind = "application");
    }

    #[test]
    fn test_log_config_info() {
        let config = crate::config::AppConfig::default();
        log_config_info(&config);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = ObservabilityConfig::default();
        let _ = init_logging(&config);
        assert!(!init_logging(&config));
    }
}
