use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while loading listener TLS material or the signing CA.
#[derive(Debug, Error)]
pub enum TlsError {
    /// TLS has been enabled but the certificate path was not provided.
    #[error("TLS is enabled but certificate path is not configured")]
    MissingCertificatePath,

    /// TLS has been enabled but the private key path was not provided.
    #[error("TLS is enabled but private key path is not configured")]
    MissingPrivateKeyPath,

    /// A PEM file could not be read from disk.
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No certificates were found in the supplied PEM file.
    #[error("Certificate file {path} does not contain any certificates")]
    EmptyCertificateChain { path: PathBuf },

    /// The certificate PEM contents were invalid or unreadable.
    #[error("Certificate file {path} is not a valid PEM: {source}")]
    InvalidCertificatePem {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The private key PEM contents were invalid or unsupported.
    #[error("Private key file {path} does not contain a supported private key")]
    InvalidPrivateKey {
        path: PathBuf,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The leaf certificate could not be parsed for metadata.
    #[error("Certificate file {path} could not be parsed: {source}")]
    CertificateMetadata {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Certificate {path} is not valid before {not_before}")]
    CertificateNotYetValid { path: PathBuf, not_before: String },

    #[error("Certificate {path} expired at {not_after}")]
    CertificateExpired { path: PathBuf, not_after: String },

    /// The client CA bundle could not be turned into a verifier.
    #[error("Client CA bundle {path} could not be used for verification: {source}")]
    InvalidClientCa {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The signing CA material was rejected.
    #[error("Signing CA material at {path} is unusable: {message}")]
    InvalidAuthority { path: PathBuf, message: String },
}
