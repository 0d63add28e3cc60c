//! Stateless X.509 helpers: loading CA material, checking client CSRs,
//! signing leaf certificates and PEM armoring.
//!
//! CA material is operator supplied, so failures to read it are internal
//! errors. CSRs come from clients, so failures to read them are bad requests.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rcgen::{
    Certificate, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose, SerialNumber, SubjectPublicKeyInfo,
};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, CertificateSigningRequestDer};
use time::OffsetDateTime;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::oid_registry::{
    Oid, OID_X509_COMMON_NAME, OID_X509_COUNTRY_NAME, OID_X509_LOCALITY_NAME, OID_X509_ORGANIZATIONAL_UNIT,
    OID_X509_ORGANIZATION_NAME, OID_X509_STATE_OR_PROVINCE_NAME,
};
use x509_parser::prelude::{FromDer, X509Certificate, X509Name};

use crate::errors::{Error, Result, SubjectField};
use crate::identity::CsrSubject;

const PEM_LINE_WIDTH: usize = 64;

/// A parsed CSR whose self-signature has been verified.
///
/// Only the Subject and the public key are retained. Requested extensions are
/// never carried into an issued certificate.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    der: Vec<u8>,
    subject: CsrSubject,
    public_key: SubjectPublicKeyInfo,
}

impl CertificateRequest {
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject as carried by the CSR. Absent components are empty.
    pub fn subject(&self) -> &CsrSubject {
        &self.subject
    }
}

/// Decode one PEM certificate and check that it parses as X.509.
pub fn load_certificate(pem: &[u8]) -> Result<CertificateDer<'static>> {
    let der = CertificateDer::from_pem_slice(pem)
        .map_err(|e| Error::internal(format!("Failed to decode certificate PEM: {}", e)))?;

    X509Certificate::from_der(der.as_ref())
        .map_err(|e| Error::internal(format!("Failed to parse certificate: {}", e)))?;

    Ok(der)
}

/// Load a CA private key, trying PKCS#1 RSA first and PKCS#8 second.
pub fn load_private_key(pem: &str) -> Result<KeyPair> {
    if let Ok(rsa_key) = rsa::RsaPrivateKey::from_pkcs1_pem(pem) {
        let pkcs8 = rsa_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::internal(format!("Failed to re-encode PKCS#1 key: {}", e)))?;
        return KeyPair::from_pem(&pkcs8)
            .map_err(|e| Error::internal(format!("Failed to load private key: {}", e)));
    }

    KeyPair::from_pem(pem).map_err(|e| Error::internal(format!("Failed to load private key: {}", e)))
}

/// Parse a CSR given as PEM or raw DER and verify its self-signature.
pub fn load_csr(bytes: &[u8]) -> Result<CertificateRequest> {
    let der = if looks_like_pem(bytes) {
        CertificateSigningRequestDer::from_pem_slice(bytes)
            .map_err(|e| Error::bad_request(format!("Failed to decode CSR PEM: {}", e)))?
            .as_ref()
            .to_vec()
    } else {
        bytes.to_vec()
    };

    let (_, csr) = X509CertificationRequest::from_der(&der)
        .map_err(|e| Error::bad_request(format!("Failed to parse CSR: {}", e)))?;

    csr.verify_signature()
        .map_err(|_| Error::bad_request("CSR signature verification failed"))?;

    let info = &csr.certification_request_info;
    let subject = subject_of(&info.subject).map_err(|e| Error::bad_request(format!("CSR: {}", e)))?;
    let public_key = SubjectPublicKeyInfo::from_der(info.subject_pki.raw)
        .map_err(|e| Error::bad_request(format!("CSR: Unsupported public key: {}", e)))?;

    Ok(CertificateRequest { der, subject, public_key })
}

/// Compare the CSR Subject against `expected`.
///
/// Fields are checked in a fixed order: Country, Organization,
/// OrganizationalUnit, Locality, Province, CommonName. Only the first
/// missing or mismatched field is reported.
pub fn validate_subject(csr: &CertificateRequest, expected: &CsrSubject) -> Result<()> {
    let actual = csr.subject();
    let checks = [
        (SubjectField::Country, &actual.country, &expected.country),
        (SubjectField::Organization, &actual.organization, &expected.organization),
        (SubjectField::OrganizationalUnit, &actual.organizational_unit, &expected.organizational_unit),
        (SubjectField::Locality, &actual.locality, &expected.locality),
        (SubjectField::Province, &actual.province, &expected.province),
        (SubjectField::CommonName, &actual.common_name, &expected.common_name),
    ];

    for (field, actual, expected) in checks {
        if actual.is_empty() {
            return Err(Error::missing_field(field));
        }
        if actual != expected {
            return Err(Error::invalid_field(field));
        }
    }

    Ok(())
}

/// Issue a client certificate for `csr`, signed by `ca_key`.
///
/// The leaf carries only the CSR Subject and public key, is valid from now
/// (whole seconds) for exactly `validity`, and is restricted to client
/// authentication. Returns the DER encoding.
pub fn sign(
    ca_certificate: &Certificate,
    csr: &CertificateRequest,
    ca_key: &KeyPair,
    validity: Duration,
) -> Result<Vec<u8>> {
    let not_before = OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp())
        .map_err(|e| Error::internal(format!("Clock out of range: {}", e)))?;
    let validity = time::Duration::try_from(validity)
        .map_err(|e| Error::internal(format!("Validity out of range: {}", e)))?;
    let not_after = not_before
        .checked_add(validity)
        .ok_or_else(|| Error::internal("Validity window overflows"))?;

    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(csr.subject());
    params.not_before = not_before;
    params.not_after = not_after;
    params.serial_number = Some(random_serial()?);
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

    let certificate = params
        .signed_by(&csr.public_key, ca_certificate, ca_key)
        .map_err(|e| Error::internal(format!("Failed to sign certificate: {}", e)))?;

    Ok(certificate.der().to_vec())
}

/// Distinguished name in issuing order: C, O, OU, L, ST, CN. Empty
/// components are left out.
pub(crate) fn distinguished_name(subject: &CsrSubject) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    let fields = [
        (DnType::CountryName, &subject.country),
        (DnType::OrganizationName, &subject.organization),
        (DnType::OrganizationalUnitName, &subject.organizational_unit),
        (DnType::LocalityName, &subject.locality),
        (DnType::StateOrProvinceName, &subject.province),
        (DnType::CommonName, &subject.common_name),
    ];
    for (kind, value) in fields {
        if !value.is_empty() {
            name.push(kind, value.as_str());
        }
    }
    name
}

/// Wrap DER bytes in a `CERTIFICATE` PEM block.
pub fn armor_certificate(der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII
        pem.push_str(std::str::from_utf8(line).unwrap_or_default());
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

/// Subject of a DER certificate, used for peer certificates.
pub fn certificate_subject(der: &[u8]) -> Result<CsrSubject> {
    let (_, certificate) = X509Certificate::from_der(der)
        .map_err(|e| Error::bad_request(format!("Failed to parse client certificate: {}", e)))?;
    subject_of(certificate.subject())
        .map_err(|e| Error::bad_request(format!("Client certificate: {}", e)))
}

/// Read the six supported Subject components.
///
/// Every RDN must hold exactly one attribute, each attribute may appear at
/// most once, and no other attribute types are allowed.
pub(crate) fn subject_of(name: &X509Name<'_>) -> std::result::Result<CsrSubject, String> {
    let mut subject = CsrSubject::default();
    let mut seen: Vec<&Oid<'_>> = Vec::with_capacity(6);

    for rdn in name.iter() {
        let mut attributes = rdn.iter();
        let (Some(attribute), None) = (attributes.next(), attributes.next()) else {
            return Err("Multi-valued Subject components are not supported.".to_string());
        };

        let oid = attribute.attr_type();
        let slot = if *oid == OID_X509_COMMON_NAME {
            &mut subject.common_name
        } else if *oid == OID_X509_COUNTRY_NAME {
            &mut subject.country
        } else if *oid == OID_X509_ORGANIZATION_NAME {
            &mut subject.organization
        } else if *oid == OID_X509_ORGANIZATIONAL_UNIT {
            &mut subject.organizational_unit
        } else if *oid == OID_X509_LOCALITY_NAME {
            &mut subject.locality
        } else if *oid == OID_X509_STATE_OR_PROVINCE_NAME {
            &mut subject.province
        } else {
            return Err(format!("Unexpected Subject component {} provided.", oid));
        };

        if seen.contains(&oid) {
            return Err(format!("Subject component {} provided more than once.", oid));
        }
        seen.push(oid);

        *slot = attribute
            .as_str()
            .map_err(|_| format!("Subject component {} is not a string.", oid))?
            .to_string();
    }

    Ok(subject)
}

fn looks_like_pem(bytes: &[u8]) -> bool {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    bytes[start..].starts_with(b"-----BEGIN")
}

/// Positive, non-zero 128-bit serial.
fn random_serial() -> Result<SerialNumber> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::internal(format!("Entropy source unavailable: {}", e)))?;
    bytes[0] = (bytes[0] & 0x7f) | 0x40;
    Ok(SerialNumber::from_slice(&bytes))
}
