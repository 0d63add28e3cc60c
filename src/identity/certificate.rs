//! Identity of clients that already hold a certificate issued by this service.

use std::sync::Arc;

use http::{HeaderMap, HeaderName};
use tracing::debug;

use crate::certificates::certificate_subject;
use crate::errors::{Error, Result};

use super::model::ClientIdentity;
use super::strategy::ClusterIdentityStrategy;
use super::subject::{CsrSubject, SubjectDefaults};

/// Derives the identity from the verified peer certificate Subject.
///
/// When TLS is terminated by a trusted proxy, the Subject can instead be
/// read from a configured header carrying it as `KEY=value` pairs. A peer
/// certificate always wins over the header.
#[derive(Debug, Clone)]
pub struct CertificateSubjectStrategy {
    defaults: SubjectDefaults,
    forwarded_header: Option<HeaderName>,
    clusters: Arc<dyn ClusterIdentityStrategy>,
}

impl CertificateSubjectStrategy {
    pub fn new(
        defaults: SubjectDefaults,
        forwarded_header: Option<&str>,
        clusters: Arc<dyn ClusterIdentityStrategy>,
    ) -> Result<Self> {
        let forwarded_header = forwarded_header
            .map(|name| {
                HeaderName::try_from(name)
                    .map_err(|e| Error::config(format!("Invalid forwarded subject header '{}': {}", name, e)))
            })
            .transpose()?;

        Ok(Self { defaults, forwarded_header, clusters })
    }

    pub fn defaults(&self) -> &SubjectDefaults {
        &self.defaults
    }

    pub fn subject(&self, peer_certificate: Option<&[u8]>, headers: &HeaderMap) -> Result<CsrSubject> {
        if let Some(der) = peer_certificate {
            return certificate_subject(der);
        }

        if let Some(name) = &self.forwarded_header {
            if let Some(value) = headers.get(name) {
                debug!(header = %name, "using forwarded certificate subject");
                let raw = value
                    .to_str()
                    .map_err(|_| Error::bad_request("Forwarded certificate subject is not valid ASCII"))?;
                return CsrSubject::parse(raw);
            }
        }

        Err(Error::bad_request("No client certificate subject provided."))
    }

    pub fn extract(&self, peer_certificate: Option<&[u8]>, headers: &HeaderMap) -> Result<ClientIdentity> {
        self.subject(peer_certificate, headers)?
            .to_identity(&self.defaults, self.clusters.as_ref())
    }
}
