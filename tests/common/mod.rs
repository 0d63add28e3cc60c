//! Common test utilities for the integration tests.
//!
//! Builds both routers around a throwaway CA and drives them with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::Extension;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use serde_json::Value;
use tower::ServiceExt;

use certbridge::api::{external_router, internal_router, ApiState, ClientConnection};
use certbridge::certificates::CertificateAuthority;
use certbridge::identity::CsrSubject;
use certbridge::tokens::{TokenService, TokenStore};
use certbridge::AppConfig;

pub const TOKEN_TTL: Duration = Duration::from_secs(300);

pub struct TestApp {
    pub state: ApiState,
    pub config: AppConfig,
    pub ca_pem: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn multi_tenant() -> Self {
        let mut config = AppConfig::default();
        config.identity.multi_tenant = true;
        Self::with_config(config)
    }

    pub fn with_config(config: AppConfig) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, "certbridge integration CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let ca = params.self_signed(&key).unwrap();

        let authority =
            CertificateAuthority::from_pem(ca.pem().as_bytes(), &key.serialize_pem(), None, Duration::from_secs(3600))
                .unwrap();
        let tokens = TokenService::new(Arc::new(TokenStore::new()), TOKEN_TTL, TOKEN_TTL);
        let state = ApiState::new(&config, Arc::new(tokens), Arc::new(authority)).unwrap();

        let ca_pem = state.authority.ca_certificate_pem().to_string();
        Self { state, config, ca_pem }
    }

    pub fn internal(&self) -> Router {
        internal_router(self.state.clone(), &self.config.server)
    }

    pub fn external(&self) -> Router {
        external_router(self.state.clone(), &self.config.server)
    }

    /// External router as seen by a client presenting `certificate` over mTLS.
    pub fn external_with_peer(&self, certificate: Option<CertificateDer<'static>>) -> Router {
        let connection = ClientConnection {
            remote_addr: SocketAddr::from(([127, 0, 0, 1], 40000)),
            peer_certificate: certificate,
        };
        self.external().layer(Extension(ConnectInfo(connection)))
    }

    pub async fn create_application_token(&self, name: &str) -> (String, String) {
        let response = send(
            self.internal(),
            Request::builder()
                .method("POST")
                .uri("/v1/applications/tokens")
                .header("Application", name)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        (body["token"].as_str().unwrap().to_string(), body["url"].as_str().unwrap().to_string())
    }

    /// Run the full token flow and return the issued client certificate.
    pub async fn onboard_application(&self, name: &str) -> CertificateDer<'static> {
        let (token, info_url) = self.create_application_token(name).await;
        let info = read_json(send(self.external(), get(&path_of(&info_url))).await).await;
        let subject = info["certificate"]["subject"].as_str().unwrap().to_string();

        let response =
            send(self.external(), sign_request("/v1/applications/certificates", &token, &csr_for(&subject))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        client_certificate(&read_json(response).await)
    }
}

pub async fn send(router: Router, request: Request<Body>) -> Response {
    router.oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn sign_request(path: &str, token: &str, csr: &str) -> Request<Body> {
    post_json(&format!("{}?token={}", path, token), serde_json::json!({ "csr": csr }))
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Path and query of an absolute URL handed out by the service.
pub fn path_of(url: &str) -> String {
    let parsed = url::Url::parse(url).unwrap();
    match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    }
}

/// Base64 encoded PEM CSR carrying `subject` (as rendered by the info endpoint).
pub fn csr_for(subject: &str) -> String {
    csr_for_subject(&CsrSubject::parse(subject).unwrap())
}

pub fn csr_for_subject(subject: &CsrSubject) -> String {
    csr_with(subject, |_| {})
}

/// Base64 encoded PEM CSR for `subject`, with the request parameters adjusted
/// by `customize` before signing.
pub fn csr_with(subject: &CsrSubject, customize: impl FnOnce(&mut CertificateParams)) -> String {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
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
            params.distinguished_name.push(kind, value.as_str());
        }
    }
    customize(&mut params);
    let pem = params.serialize_request(&key).unwrap().pem().unwrap();
    STANDARD.encode(pem)
}

pub fn decode_pem(encoded: &Value) -> String {
    String::from_utf8(STANDARD.decode(encoded.as_str().unwrap()).unwrap()).unwrap()
}

pub fn client_certificate(body: &Value) -> CertificateDer<'static> {
    CertificateDer::from_pem_slice(decode_pem(&body["clientCrt"]).as_bytes()).unwrap()
}
