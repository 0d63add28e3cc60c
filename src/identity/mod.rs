//! # Client Identity
//!
//! Who a request acts for, and how that is derived: from request headers on
//! first contact, from the client certificate afterwards.

pub mod certificate;
pub mod context;
pub mod model;
pub mod strategy;
pub mod subject;

pub use certificate::CertificateSubjectStrategy;
pub use context::{IdentityContext, IdentitySource};
pub use model::{ApplicationIdentity, ClientIdentity, ClusterIdentity, IdentityKind};
pub use strategy::{
    cluster_strategy, ApplicationIdentityStrategy, ClusterIdentityStrategy, DisabledClusterStrategy,
    HeaderClusterStrategy,
};
pub use subject::{CsrSubject, SubjectDefaults, CLUSTER_COMMON_NAME};

impl ClientIdentity {
    /// The Subject a CSR for this identity must carry.
    pub fn to_subject(&self, defaults: &SubjectDefaults) -> CsrSubject {
        CsrSubject::for_identity(self, defaults)
    }
}
