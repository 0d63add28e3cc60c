use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use rustls::RootCertStore;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::errors::TlsError;

/// Metadata extracted from the listener leaf certificate for logging.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
}

/// Loaded certificate materials used for configuring the TLS listener.
#[derive(Debug)]
pub struct CertificateBundle {
    pub leaf: CertificateDer<'static>,
    pub intermediates: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
    pub info: CertificateInfo,
}

impl CertificateBundle {
    /// Leaf first, then intermediates.
    pub fn chain(&self) -> Vec<CertificateDer<'static>> {
        let mut chain = Vec::with_capacity(1 + self.intermediates.len());
        chain.push(self.leaf.clone());
        chain.extend(self.intermediates.iter().cloned());
        chain
    }
}

/// Load and validate listener certificate materials from disk.
pub fn load_certificate_bundle(
    cert_path: &Path,
    key_path: &Path,
    chain_path: Option<&Path>,
) -> Result<CertificateBundle, TlsError> {
    let mut leaf_chain = read_certificates(cert_path)?;
    if leaf_chain.is_empty() {
        return Err(TlsError::EmptyCertificateChain { path: cert_path.to_path_buf() });
    }

    let leaf = leaf_chain.remove(0);
    let mut intermediates = leaf_chain;
    if let Some(chain_path) = chain_path {
        intermediates.extend(read_certificates(chain_path)?);
    }

    let key_bytes = read(key_path)?;
    let private_key = PrivateKeyDer::from_pem_slice(&key_bytes).map_err(|err| {
        TlsError::InvalidPrivateKey { path: key_path.to_path_buf(), source: Some(anyhow!(err)) }
    })?;

    let info = parse_certificate_info(&leaf, cert_path)?;

    Ok(CertificateBundle { leaf, intermediates, private_key, info })
}

/// Trust anchors used to verify client certificates on the external listener.
pub fn load_client_roots(path: &Path) -> Result<RootCertStore, TlsError> {
    let certificates = read_certificates(path)?;
    if certificates.is_empty() {
        return Err(TlsError::EmptyCertificateChain { path: path.to_path_buf() });
    }

    let mut roots = RootCertStore::empty();
    for certificate in certificates {
        roots
            .add(certificate)
            .map_err(|err| TlsError::InvalidClientCa { path: path.to_path_buf(), source: anyhow!(err) })?;
    }
    Ok(roots)
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::ReadError { path: PathBuf::from(path), source })
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let bytes = read(path)?;
    CertificateDer::pem_slice_iter(&bytes)
        .map(|result| {
            result.map_err(|err| TlsError::InvalidCertificatePem { path: path.to_path_buf(), source: anyhow!(err) })
        })
        .collect()
}

fn parse_certificate_info(cert: &CertificateDer<'static>, path: &Path) -> Result<CertificateInfo, TlsError> {
    let (_, parsed) = X509Certificate::from_der(cert.as_ref())
        .map_err(|err| TlsError::CertificateMetadata { path: path.to_path_buf(), source: anyhow!(err) })?;

    let validity = parsed.validity();
    let info = CertificateInfo {
        subject: parsed.subject().to_string(),
        issuer: parsed.issuer().to_string(),
        not_before: validity.not_before.to_string(),
        not_after: validity.not_after.to_string(),
    };

    let now = x509_parser::time::ASN1Time::now();
    if validity.not_before > now {
        return Err(TlsError::CertificateNotYetValid { path: path.to_path_buf(), not_before: info.not_before });
    }
    if validity.not_after <= now {
        return Err(TlsError::CertificateExpired { path: path.to_path_buf(), not_after: info.not_after });
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DnType, KeyPair};
    use tempfile::TempDir;

    struct Files {
        _dir: TempDir,
        cert: PathBuf,
        key: PathBuf,
    }

    fn write_files(not_after: time::OffsetDateTime) -> Files {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, "certbridge listener");
        params.not_before = time::OffsetDateTime::now_utc() - time::Duration::days(1);
        params.not_after = not_after;
        let certificate = params.self_signed(&key).unwrap();

        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        fs::write(&cert, certificate.pem()).unwrap();
        fs::write(&key_path, key.serialize_pem()).unwrap();
        Files { _dir: dir, cert, key: key_path }
    }

    #[test]
    fn loads_valid_bundle() {
        let files = write_files(time::OffsetDateTime::now_utc() + time::Duration::days(30));
        let bundle = load_certificate_bundle(&files.cert, &files.key, None).unwrap();

        assert!(bundle.info.subject.contains("certbridge listener"));
        assert!(bundle.intermediates.is_empty());
        assert_eq!(bundle.chain().len(), 1);
    }

    #[test]
    fn rejects_expired_certificate() {
        let files = write_files(time::OffsetDateTime::now_utc() - time::Duration::hours(1));
        let err = load_certificate_bundle(&files.cert, &files.key, None).unwrap_err();
        assert!(matches!(err, TlsError::CertificateExpired { .. }));
    }

    #[test]
    fn rejects_empty_and_missing_files() {
        let files = write_files(time::OffsetDateTime::now_utc() + time::Duration::days(30));
        let empty = files._dir.path().join("empty.pem");
        fs::write(&empty, "").unwrap();

        assert!(matches!(
            load_certificate_bundle(&empty, &files.key, None),
            Err(TlsError::EmptyCertificateChain { .. })
        ));
        assert!(matches!(
            load_certificate_bundle(&files.cert, &files._dir.path().join("missing.pem"), None),
            Err(TlsError::ReadError { .. })
        ));
    }

    #[test]
    fn client_roots_are_loaded() {
        let files = write_files(time::OffsetDateTime::now_utc() + time::Duration::days(30));
        let roots = load_client_roots(&files.cert).unwrap();
        assert_eq!(roots.len(), 1);
    }
}
