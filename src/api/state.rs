use std::sync::Arc;

use crate::certificates::CertificateAuthority;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::identity::{
    cluster_strategy, ApplicationIdentityStrategy, CertificateSubjectStrategy, ClusterIdentityStrategy,
    SubjectDefaults,
};
use crate::tokens::TokenService;

use super::urls::UrlBuilder;

/// Shared state handed to every handler and middleware.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub tokens: Arc<TokenService>,
    pub authority: Arc<CertificateAuthority>,
    pub applications: Arc<ApplicationIdentityStrategy>,
    pub certificates: Arc<CertificateSubjectStrategy>,
    pub urls: Arc<UrlBuilder>,
}

impl ApiState {
    pub fn new(
        config: &AppConfig,
        tokens: Arc<TokenService>,
        authority: Arc<CertificateAuthority>,
    ) -> Result<Self> {
        let cluster = cluster_strategy(config.identity.multi_tenant);
        let certificates = CertificateSubjectStrategy::new(
            SubjectDefaults::from(&config.certificate),
            config.identity.forwarded_subject_header.as_deref(),
            cluster.clone(),
        )?;

        Ok(Self {
            tokens,
            authority,
            applications: Arc::new(ApplicationIdentityStrategy::new(cluster)),
            certificates: Arc::new(certificates),
            urls: Arc::new(UrlBuilder::from_config(&config.urls)?),
        })
    }

    pub fn clusters(&self) -> &Arc<dyn ClusterIdentityStrategy> {
        self.applications.cluster_strategy()
    }

    pub fn subject_defaults(&self) -> &SubjectDefaults {
        self.certificates.defaults()
    }
}
