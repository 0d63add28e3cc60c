use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::certificates::CertificateChain;
use crate::identity::ClientIdentity;

/// Key algorithm clients are expected to use for their CSR.
pub const KEY_ALGORITHM: &str = "rsa2048";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeUrls {
    pub events_url: String,
    pub metadata_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUrls {
    pub certificates_url: String,
    pub info_url: String,
    #[serde(rename = "runtimeURLs", skip_serializing_if = "Option::is_none")]
    pub runtime_urls: Option<RuntimeUrls>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub subject: String,
    pub extensions: String,
    pub key_algorithm: String,
}

impl CertificateInfo {
    pub fn for_subject(subject: String) -> Self {
        Self { subject, extensions: String::new(), key_algorithm: KEY_ALGORITHM.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrInfoResponse {
    pub csr_url: String,
    pub api: ApiUrls,
    pub certificate: CertificateInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsrRequest {
    /// Base64 encoded PEM or DER CSR
    pub csr: String,
}

/// Every certificate is PEM, then base64 wrapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResponse {
    pub crt: String,
    pub client_crt: String,
    pub ca_crt: String,
}

impl From<CertificateChain> for CertificateResponse {
    fn from(chain: CertificateChain) -> Self {
        Self {
            crt: STANDARD.encode(chain.full_chain),
            client_crt: STANDARD.encode(chain.client_certificate),
            ca_crt: STANDARD.encode(chain.ca_certificate),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_url: Option<String>,
    pub renew_cert_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementInfoResponse {
    pub urls: ManagementUrls,
    pub client_identity: ClientIdentity,
    pub certificate: CertificateInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csr_info_uses_wire_field_names() {
        let response = CsrInfoResponse {
            csr_url: "https://c/v1/applications/certificates?token=t".into(),
            api: ApiUrls {
                certificates_url: "https://c/v1/applications/certificates".into(),
                info_url: "https://c/v1/applications/management/info".into(),
                runtime_urls: Some(RuntimeUrls {
                    events_url: "https://g/orders/v1/events".into(),
                    metadata_url: "https://g/orders/v1/metadata/services".into(),
                }),
            },
            certificate: CertificateInfo::for_subject("OU=g,O=t,L=l,ST=s,C=DE,CN=orders".into()),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["csrUrl"], "https://c/v1/applications/certificates?token=t");
        assert_eq!(json["api"]["runtimeURLs"]["eventsUrl"], "https://g/orders/v1/events");
        assert_eq!(json["certificate"]["keyAlgorithm"], "rsa2048");
        assert_eq!(json["certificate"]["extensions"], "");
    }

    #[test]
    fn runtime_urls_are_omitted_when_absent() {
        let urls = ApiUrls { certificates_url: "a".into(), info_url: "b".into(), runtime_urls: None };
        let json = serde_json::to_value(&urls).unwrap();
        assert!(json.get("runtimeURLs").is_none());
    }

    #[test]
    fn certificate_response_wraps_pem_in_base64() {
        let chain = CertificateChain {
            client_certificate: "client".into(),
            ca_certificate: "ca".into(),
            full_chain: "clientca".into(),
        };
        let response = CertificateResponse::from(chain);

        assert_eq!(STANDARD.decode(response.crt).unwrap(), b"clientca");
        assert_eq!(STANDARD.decode(response.client_crt).unwrap(), b"client");
        assert_eq!(STANDARD.decode(response.ca_crt).unwrap(), b"ca");
    }
}
