use std::path::Path;
use std::time::Duration;

use rcgen::{Certificate, CertificateParams, KeyPair};
use tracing::{info, instrument};

use crate::config::CaConfig;
use crate::errors::{Error, Result, TlsError};

use super::utility::{self, CertificateRequest};

/// PEM encoded result of one signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    pub client_certificate: String,
    pub ca_certificate: String,
    /// Client certificate, then the optional root, then the CA certificate.
    pub full_chain: String,
}

/// CA materials loaded once at start-up.
pub struct CertificateAuthority {
    issuer: Certificate,
    key: KeyPair,
    ca_pem: String,
    root_pem: Option<String>,
    validity: Duration,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("has_root", &self.root_pem.is_some())
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// Build from PEM material. `root_pem` is appended to every returned chain.
    pub fn from_pem(
        certificate_pem: &[u8],
        key_pem: &str,
        root_pem: Option<&[u8]>,
        validity: Duration,
    ) -> Result<Self> {
        let ca_der = utility::load_certificate(certificate_pem)?;
        let key = utility::load_private_key(key_pem)?;

        // rcgen signs against a Certificate; rebuilding one from the CA's own
        // parameters keeps the issuer name identical to the CA Subject.
        let issuer = CertificateParams::from_ca_cert_der(&ca_der)
            .and_then(|params| params.self_signed(&key))
            .map_err(|e| Error::internal(format!("CA certificate cannot be used for signing: {}", e)))?;

        let root_pem = root_pem
            .map(|pem| utility::load_certificate(pem).map(|der| utility::armor_certificate(&der)))
            .transpose()?;

        Ok(Self { issuer, key, ca_pem: utility::armor_certificate(&ca_der), root_pem, validity })
    }

    #[instrument(skip(config), fields(certificate = %config.certificate_path.display()))]
    pub fn from_config(config: &CaConfig, validity: Duration) -> Result<Self> {
        let certificate = read_file(&config.certificate_path)?;
        let key = read_file(&config.key_path)?;
        let key = String::from_utf8(key).map_err(|_| TlsError::InvalidAuthority {
            path: config.key_path.clone(),
            message: "private key is not valid UTF-8 PEM".to_string(),
        })?;
        let root = config.root_certificate_path.as_deref().map(read_file).transpose()?;

        let authority = Self::from_pem(&certificate, &key, root.as_deref(), validity)?;
        info!(has_root = authority.root_pem.is_some(), "loaded signing CA");
        Ok(authority)
    }

    pub fn ca_certificate_pem(&self) -> &str {
        &self.ca_pem
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Sign an already validated CSR and assemble the chain.
    pub fn issue(&self, csr: &CertificateRequest) -> Result<CertificateChain> {
        let der = utility::sign(&self.issuer, csr, &self.key, self.validity)?;
        let client_certificate = utility::armor_certificate(&der);

        let mut full_chain = client_certificate.clone();
        if let Some(root) = &self.root_pem {
            full_chain.push_str(root);
        }
        full_chain.push_str(&self.ca_pem);

        Ok(CertificateChain { client_certificate, ca_certificate: self.ca_pem.clone(), full_chain })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|source| TlsError::ReadError { path: path.to_path_buf(), source }.into())
}
