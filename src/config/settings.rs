//! # Configuration Settings
//!
//! Defines the configuration structure for the certbridge onboarding service.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Signing CA material
    #[validate(nested)]
    pub ca: CaConfig,

    /// Issued certificate parameters
    #[validate(nested)]
    pub certificate: CertificateConfig,

    /// Provisioning token lifetimes
    #[validate(nested)]
    pub tokens: TokenConfig,

    /// Client identity extraction
    #[validate(nested)]
    pub identity: IdentityConfig,

    /// URLs handed out to clients
    #[validate(nested)]
    pub urls: UrlConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;

        self.validate_custom()?;

        Ok(())
    }

    fn validate_custom(&self) -> Result<()> {
        if self.server.internal_host == self.server.external_host
            && self.server.internal_port == self.server.external_port
        {
            return Err(Error::config("Internal and external listeners cannot share an address"));
        }

        if self.observability.metrics_port != 0
            && (self.observability.metrics_port == self.server.internal_port
                || self.observability.metrics_port == self.server.external_port)
        {
            return Err(Error::config("Metrics port cannot be shared with an API listener"));
        }

        Ok(())
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the internal (token issuing) listener
    #[validate(length(min = 1, message = "Internal host cannot be empty"))]
    pub internal_host: String,

    /// Port for the internal listener
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub internal_port: u16,

    /// Bind address for the external (client facing) listener
    #[validate(length(min = 1, message = "External host cannot be empty"))]
    pub external_host: String,

    /// Port for the external listener
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub external_port: u16,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// Maximum request body size in bytes
    #[validate(range(min = 1024, message = "Max body size must be at least 1KB"))]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            internal_host: "127.0.0.1".to_string(),
            internal_port: 8080,
            external_host: "0.0.0.0".to_string(),
            external_port: 8081,
            timeout_seconds: 30,
            max_body_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn internal_bind_address(&self) -> String {
        format!("{}:{}", self.internal_host, self.internal_port)
    }

    pub fn external_bind_address(&self) -> String {
        format!("{}:{}", self.external_host, self.external_port)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Location of the CA used to sign client certificates.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CaConfig {
    /// PEM encoded CA certificate
    pub certificate_path: PathBuf,

    /// PEM encoded CA private key (PKCS#1 or PKCS#8)
    pub key_path: PathBuf,

    /// Optional root certificate appended to returned chains
    pub root_certificate_path: Option<PathBuf>,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            certificate_path: PathBuf::from("certs/ca.crt"),
            key_path: PathBuf::from("certs/ca.key"),
            root_certificate_path: None,
        }
    }
}

/// Parameters of issued client certificates.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CertificateConfig {
    /// Validity of issued certificates in days
    #[validate(range(min = 1, max = 3650, message = "Validity must be between 1 and 3650 days"))]
    pub validity_days: u32,

    #[validate(length(equal = 2, message = "Country must be a two letter code"))]
    pub country: String,

    #[validate(length(min = 1, message = "Organization cannot be empty"), custom(function = "validate_subject_value"))]
    pub organization: String,

    #[validate(
        length(min = 1, message = "Organizational unit cannot be empty"),
        custom(function = "validate_subject_value")
    )]
    pub organizational_unit: String,

    #[validate(length(min = 1, message = "Locality cannot be empty"), custom(function = "validate_subject_value"))]
    pub locality: String,

    #[validate(length(min = 1, message = "Province cannot be empty"), custom(function = "validate_subject_value"))]
    pub province: String,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            validity_days: 90,
            country: "DE".to_string(),
            organization: "Organization".to_string(),
            organizational_unit: "OrgUnit".to_string(),
            locality: "Waldorf".to_string(),
            province: "Waldorf".to_string(),
        }
    }
}

impl CertificateConfig {
    pub fn validity(&self) -> Duration {
        Duration::from_secs(u64::from(self.validity_days) * 24 * 60 * 60)
    }
}

/// Values end up inside a rendered Subject string.
fn validate_subject_value(value: &str) -> std::result::Result<(), ValidationError> {
    if value.contains(',') || value.contains('=') {
        return Err(ValidationError::new("subject_value")
            .with_message("Subject values cannot contain ',' or '='".into()));
    }
    Ok(())
}

/// Provisioning token lifetimes
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of application tokens in seconds
    #[validate(range(min = 1, max = 86400, message = "Token TTL must be between 1 second and 24 hours"))]
    pub application_ttl_seconds: u64,

    /// Lifetime of cluster tokens in seconds
    #[validate(range(min = 1, max = 86400, message = "Token TTL must be between 1 second and 24 hours"))]
    pub cluster_ttl_seconds: u64,

    /// How often expired tokens are purged
    #[validate(range(min = 1, max = 3600, message = "Purge interval must be between 1 and 3600 seconds"))]
    pub purge_interval_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { application_ttl_seconds: 300, cluster_ttl_seconds: 300, purge_interval_seconds: 60 }
    }
}

impl TokenConfig {
    pub fn application_ttl(&self) -> Duration {
        Duration::from_secs(self.application_ttl_seconds)
    }

    pub fn cluster_ttl(&self) -> Duration {
        Duration::from_secs(self.cluster_ttl_seconds)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_seconds)
    }
}

/// Client identity extraction
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Read tenant and group from request headers
    pub multi_tenant: bool,

    /// Header carrying the verified client Subject when TLS is terminated upstream
    pub forwarded_subject_header: Option<String>,
}

/// URLs handed out to clients
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UrlConfig {
    /// Base URL of the external listener as seen by clients
    #[validate(url(message = "External base URL must be a valid URL"))]
    pub external_base_url: String,

    /// Base URL of the gateway serving events and metadata, if any
    #[validate(url(message = "Gateway base URL must be a valid URL"))]
    pub gateway_base_url: Option<String>,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self { external_base_url: "https://localhost:8081".to_string(), gateway_base_url: None }
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Metrics server port (0 = disabled)
    pub metrics_port: u16,

    /// Tracing service name
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_port: 0,
            service_name: "certbridge".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }
}
