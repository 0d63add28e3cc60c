//! Absolute URLs handed out to clients.

use url::Url;

use crate::config::UrlConfig;
use crate::errors::{Error, Result};
use crate::identity::{ClientIdentity, IdentityKind};

use super::dto::RuntimeUrls;

pub const API_PREFIX: &str = "/v1";

/// Path segment serving each identity kind.
pub fn kind_segment(kind: IdentityKind) -> &'static str {
    match kind {
        IdentityKind::Application => "applications",
        IdentityKind::Cluster => "runtimes",
    }
}

#[derive(Debug, Clone)]
pub struct UrlBuilder {
    external_base: String,
    gateway_base: Option<String>,
}

impl UrlBuilder {
    pub fn new(external_base: &str, gateway_base: Option<&str>) -> Result<Self> {
        Ok(Self { external_base: normalize(external_base)?, gateway_base: gateway_base.map(normalize).transpose()? })
    }

    pub fn from_config(config: &UrlConfig) -> Result<Self> {
        Self::new(&config.external_base_url, config.gateway_base_url.as_deref())
    }

    fn endpoint(&self, kind: IdentityKind, path: &str) -> String {
        format!("{}{}/{}/{}", self.external_base, API_PREFIX, kind_segment(kind), path)
    }

    pub fn csr_info_url(&self, kind: IdentityKind, token: &str) -> String {
        with_token(self.endpoint(kind, "signingRequests/info"), token)
    }

    pub fn certificates_url(&self, kind: IdentityKind) -> String {
        self.endpoint(kind, "certificates")
    }

    pub fn csr_url(&self, kind: IdentityKind, token: &str) -> String {
        with_token(self.certificates_url(kind), token)
    }

    pub fn management_info_url(&self, kind: IdentityKind) -> String {
        self.endpoint(kind, "management/info")
    }

    pub fn renewal_url(&self, kind: IdentityKind) -> String {
        self.endpoint(kind, "certificates/renewals")
    }

    /// Gateway URLs an application sends events and metadata to.
    pub fn runtime_urls(&self, identity: &ClientIdentity) -> Option<RuntimeUrls> {
        let gateway = self.gateway_base.as_ref()?;
        let application = identity.as_application()?;
        Some(RuntimeUrls {
            events_url: format!("{}/{}/v1/events", gateway, application.application),
            metadata_url: format!("{}/{}/v1/metadata/services", gateway, application.application),
        })
    }
}

fn normalize(base: &str) -> Result<String> {
    let parsed = Url::parse(base).map_err(|e| Error::config(format!("Invalid base URL '{}': {}", base, e)))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn with_token(url: String, token: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    format!("{}?token={}", url, encoded)
}
