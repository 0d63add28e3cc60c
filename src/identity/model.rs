use serde::{Deserialize, Serialize};

use super::strategy::ClusterIdentityStrategy;

/// Identity of a single application inside a tenant and group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationIdentity {
    pub application: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub group: String,
}

impl ApplicationIdentity {
    pub fn new(
        application: impl Into<String>,
        tenant: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self { application: application.into(), tenant: tenant.into(), group: group.into() }
    }

    pub fn cluster(&self) -> ClusterIdentity {
        ClusterIdentity { tenant: self.tenant.clone(), group: self.group.clone() }
    }
}

/// Identity of a cluster (runtime). Empty in single-tenant deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterIdentity {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub group: String,
}

impl ClusterIdentity {
    pub fn new(tenant: impl Into<String>, group: impl Into<String>) -> Self {
        Self { tenant: tenant.into(), group: group.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.tenant.is_empty() && self.group.is_empty()
    }
}

/// Who a token or certificate belongs to.
///
/// Serialized with a `kind` tag so a token payload can never be mistaken for
/// the other variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClientIdentity {
    Application(ApplicationIdentity),
    Cluster(ClusterIdentity),
}

impl ClientIdentity {
    pub fn kind(&self) -> IdentityKind {
        match self {
            ClientIdentity::Application(_) => IdentityKind::Application,
            ClientIdentity::Cluster(_) => IdentityKind::Cluster,
        }
    }

    /// True when every field the deployment's cluster strategy requires is present.
    pub fn is_complete(&self, clusters: &dyn ClusterIdentityStrategy) -> bool {
        match self {
            ClientIdentity::Application(app) => !app.application.is_empty() && clusters.is_valid(&app.cluster()),
            ClientIdentity::Cluster(cluster) => clusters.is_valid(cluster),
        }
    }

    pub fn tenant(&self) -> &str {
        match self {
            ClientIdentity::Application(app) => &app.tenant,
            ClientIdentity::Cluster(cluster) => &cluster.tenant,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            ClientIdentity::Application(app) => &app.group,
            ClientIdentity::Cluster(cluster) => &cluster.group,
        }
    }

    pub fn as_application(&self) -> Option<&ApplicationIdentity> {
        match self {
            ClientIdentity::Application(app) => Some(app),
            ClientIdentity::Cluster(_) => None,
        }
    }
}

impl From<ApplicationIdentity> for ClientIdentity {
    fn from(identity: ApplicationIdentity) -> Self {
        ClientIdentity::Application(identity)
    }
}

impl From<ClusterIdentity> for ClientIdentity {
    fn from(identity: ClusterIdentity) -> Self {
        ClientIdentity::Cluster(identity)
    }
}

/// Which half of the API a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityKind {
    Application,
    Cluster,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Application => "application",
            IdentityKind::Cluster => "cluster",
        }
    }
}
