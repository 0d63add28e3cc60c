//! # certbridge
//!
//! Certificate-based onboarding for applications and clusters. A trusted
//! caller obtains a short-lived one-time token for an identity; the client
//! trades that token for the expected CSR Subject and then for a client
//! certificate signed by the configured CA. Afterwards the certificate itself
//! authenticates the client.
//!
//! ```text
//! internal listener ──► TokenService ──► TokenStore (TTL, single use)
//! external listener ──► identity middleware ──► CertificateAuthority
//! ```

pub mod api;
pub mod certificates;
pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
pub mod observability;
pub mod tokens;
pub mod utils;

use std::sync::Arc;

pub use config::{ApiTlsConfig, AppConfig};
pub use errors::{Error, Result};

use api::{external_router, internal_router, start_external_server, start_internal_server, ApiState};
use certificates::CertificateAuthority;
use tokens::{TokenService, TokenStore};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Wires the token service, CA and both listeners together.
pub struct Server {
    config: AppConfig,
    tls: Option<ApiTlsConfig>,
}

impl Server {
    pub fn new(config: AppConfig, tls: Option<ApiTlsConfig>) -> Self {
        Self { config, tls }
    }

    /// Load the CA and build the shared API state.
    pub fn build_state(&self) -> Result<ApiState> {
        let store = Arc::new(TokenStore::new());
        let tokens = Arc::new(TokenService::from_config(store, &self.config.tokens));
        let authority =
            Arc::new(CertificateAuthority::from_config(&self.config.ca, self.config.certificate.validity())?);
        ApiState::new(&self.config, tokens, authority)
    }

    /// Serve until ctrl-c or until either listener fails.
    pub async fn run(self) -> Result<()> {
        let state = self.build_state()?;
        let purge = state.tokens.clone().spawn_purge_task(self.config.tokens.purge_interval());

        let internal_address = self.config.server.internal_bind_address();
        let external_address = self.config.server.external_bind_address();
        let internal = internal_router(state.clone(), &self.config.server);
        let external = external_router(state, &self.config.server);

        tracing::info!(app_name = APP_NAME, version = VERSION, "Starting certbridge");

        let result = tokio::try_join!(
            start_internal_server(&internal_address, internal),
            start_external_server(&external_address, external, self.tls.as_ref()),
        );

        purge.abort();
        tracing::info!("Shutting down certbridge");
        result.map(|_| ())
    }
}
