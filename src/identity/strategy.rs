//! Header based identity extraction used on first contact, before the client
//! holds a certificate.

use std::fmt::Debug;
use std::sync::Arc;

use http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::errors::{Error, Result};

use super::model::{ApplicationIdentity, ClusterIdentity};
use super::subject::SubjectDefaults;

pub const APPLICATION_HEADER: &str = "Application";
pub const TENANT_HEADER: &str = "Tenant";
pub const GROUP_HEADER: &str = "Group";

const MAX_APPLICATION_NAME_LEN: usize = 253;

static APPLICATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-.a-z0-9]*[a-z0-9])?$").expect("application name pattern is valid"));

/// Reads the tenant and group a request acts for.
pub trait ClusterIdentityStrategy: Send + Sync + Debug {
    fn extract(&self, headers: &HeaderMap) -> Result<ClusterIdentity>;

    fn is_valid(&self, identity: &ClusterIdentity) -> bool;

    /// Recover the cluster part from the Organization and Organizational
    /// Unit of an issued certificate.
    fn cluster_from_subject(
        &self,
        organization: &str,
        organizational_unit: &str,
        defaults: &SubjectDefaults,
    ) -> Result<ClusterIdentity>;
}

/// Multi-tenant deployments: tenant and group come from headers and are both required.
#[derive(Debug, Clone, Default)]
pub struct HeaderClusterStrategy;

impl ClusterIdentityStrategy for HeaderClusterStrategy {
    fn extract(&self, headers: &HeaderMap) -> Result<ClusterIdentity> {
        Ok(ClusterIdentity {
            tenant: header_value(headers, TENANT_HEADER)?.unwrap_or_default(),
            group: header_value(headers, GROUP_HEADER)?.unwrap_or_default(),
        })
    }

    fn is_valid(&self, identity: &ClusterIdentity) -> bool {
        !identity.tenant.is_empty() && !identity.group.is_empty()
    }

    fn cluster_from_subject(
        &self,
        organization: &str,
        organizational_unit: &str,
        _defaults: &SubjectDefaults,
    ) -> Result<ClusterIdentity> {
        Ok(ClusterIdentity::new(organization, organizational_unit))
    }
}

/// Single-tenant deployments: headers are ignored and the empty identity is always valid.
#[derive(Debug, Clone, Default)]
pub struct DisabledClusterStrategy;

impl ClusterIdentityStrategy for DisabledClusterStrategy {
    fn extract(&self, _headers: &HeaderMap) -> Result<ClusterIdentity> {
        Ok(ClusterIdentity::default())
    }

    fn is_valid(&self, _identity: &ClusterIdentity) -> bool {
        true
    }

    /// Single-tenant certificates always carry the configured defaults.
    fn cluster_from_subject(
        &self,
        organization: &str,
        organizational_unit: &str,
        defaults: &SubjectDefaults,
    ) -> Result<ClusterIdentity> {
        if organization != defaults.organization || organizational_unit != defaults.organizational_unit {
            return Err(Error::bad_request(
                "Certificate Organization or Organizational Unit does not belong to this deployment",
            ));
        }
        Ok(ClusterIdentity::default())
    }
}

/// Pick the cluster strategy once at start-up.
pub fn cluster_strategy(multi_tenant: bool) -> Arc<dyn ClusterIdentityStrategy> {
    if multi_tenant {
        Arc::new(HeaderClusterStrategy)
    } else {
        Arc::new(DisabledClusterStrategy)
    }
}

/// Application name from the path or `Application` header, plus the cluster part.
#[derive(Debug, Clone)]
pub struct ApplicationIdentityStrategy {
    cluster: Arc<dyn ClusterIdentityStrategy>,
}

impl ApplicationIdentityStrategy {
    pub fn new(cluster: Arc<dyn ClusterIdentityStrategy>) -> Self {
        Self { cluster }
    }

    /// `path_name` wins over the header; a random name is generated when both are absent.
    pub fn extract(&self, headers: &HeaderMap, path_name: Option<&str>) -> Result<ApplicationIdentity> {
        let application = match path_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => header_value(headers, APPLICATION_HEADER)?.unwrap_or_else(|| Uuid::new_v4().to_string()),
        };

        validate_application_name(&application)?;

        let cluster = self.cluster.extract(headers)?;
        Ok(ApplicationIdentity { application, tenant: cluster.tenant, group: cluster.group })
    }

    pub fn is_valid(&self, identity: &ApplicationIdentity) -> bool {
        !identity.application.is_empty() && self.cluster.is_valid(&identity.cluster())
    }

    pub fn cluster_strategy(&self) -> &Arc<dyn ClusterIdentityStrategy> {
        &self.cluster
    }
}

pub fn validate_application_name(name: &str) -> Result<()> {
    if name.len() > MAX_APPLICATION_NAME_LEN || !APPLICATION_NAME.is_match(name) {
        return Err(Error::bad_request(format!(
            "Invalid application name '{}': use lowercase letters, digits, '-' and '.'",
            name
        )));
    }
    Ok(())
}

/// Trimmed header value, `None` when absent or blank.
fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| Error::bad_request(format!("Header '{}' must be valid ASCII", name)))?
        .trim();

    if value.contains(',') || value.contains('=') {
        return Err(Error::bad_request(format!("Header '{}' cannot contain ',' or '='", name)));
    }

    Ok(Some(value.to_string()).filter(|value| !value.is_empty()))
}
