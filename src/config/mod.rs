//! # Configuration Management
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `CERTBRIDGE_*` environment variables (`__` separates nested keys,
//! e.g. `CERTBRIDGE_TOKENS__APPLICATION_TTL_SECONDS=600`).

pub mod settings;
pub mod tls;

pub use settings::{
    AppConfig, CaConfig, CertificateConfig, IdentityConfig, ObservabilityConfig, ServerConfig,
    TokenConfig, UrlConfig,
};
pub use tls::ApiTlsConfig;

use std::path::Path;

use config::{Environment, File, FileFormat};

use crate::Result;

const ENV_PREFIX: &str = "CERTBRIDGE";

impl AppConfig {
    /// Load and validate configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config: AppConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}
