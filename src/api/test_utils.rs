//! Test helpers for router level unit tests.
//!
//! Integration tests under `tests/` build the same state from PEM material
//! through the public API instead.

use std::sync::Arc;
use std::time::Duration;

use axum::body::to_bytes;
use axum::response::Response;

use crate::certificates::utility::test_support::test_ca;
use crate::certificates::CertificateAuthority;
use crate::config::AppConfig;
use crate::tokens::{TokenService, TokenStore};

use super::state::ApiState;

pub fn app_state(multi_tenant: bool) -> ApiState {
    let mut config = AppConfig::default();
    config.identity.multi_tenant = multi_tenant;

    let ca = test_ca();
    let authority = CertificateAuthority::from_pem(
        ca.certificate.pem().as_bytes(),
        &ca.key.serialize_pem(),
        None,
        Duration::from_secs(3600),
    )
    .unwrap();

    let tokens = TokenService::from_config(Arc::new(TokenStore::new()), &config.tokens);
    ApiState::new(&config, Arc::new(tokens), Arc::new(authority)).unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
