//! Client certificate issuance.

pub mod authority;
pub mod utility;

pub use authority::{CertificateAuthority, CertificateChain};
pub use utility::{
    armor_certificate, certificate_subject, load_certificate, load_csr, load_private_key, sign,
    validate_subject, CertificateRequest,
};
