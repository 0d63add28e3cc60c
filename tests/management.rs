//! Certificate authenticated endpoints: management info and renewal.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use certbridge::certificates::certificate_subject;
use certbridge::identity::CsrSubject;
use common::*;

const RENEWALS: &str = "/v1/applications/certificates/renewals";

#[tokio::test]
async fn management_info_describes_the_certificate_holder() {
    let app = TestApp::new();
    let certificate = app.onboard_application("orders").await;

    let response = send(app.external_with_peer(Some(certificate)), get("/v1/applications/management/info")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;

    assert_eq!(body["urls"]["renewCertUrl"], "https://localhost:8081/v1/applications/certificates/renewals");
    assert!(body["urls"].get("eventsUrl").is_none());
    assert_eq!(
        body["clientIdentity"],
        json!({"kind": "application", "application": "orders", "tenant": "", "group": ""})
    );
    assert_eq!(
        body["certificate"]["subject"],
        "OU=OrgUnit,O=Organization,L=Waldorf,ST=Waldorf,C=DE,CN=orders"
    );
}

#[tokio::test]
async fn management_info_without_certificate_is_rejected() {
    let app = TestApp::new();

    let response = send(app.external_with_peer(None), get("/v1/applications/management/info")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // no connection info at all behaves the same
    let response = send(app.external(), get("/v1/applications/management/info")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn application_certificate_cannot_reach_runtime_management() {
    let app = TestApp::new();
    let certificate = app.onboard_application("orders").await;

    let response = send(app.external_with_peer(Some(certificate)), get("/v1/runtimes/management/info")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn certificate_is_renewed_for_the_same_subject() {
    let app = TestApp::new();
    let certificate = app.onboard_application("orders").await;
    let subject = certificate_subject(&certificate).unwrap();

    let response = send(
        app.external_with_peer(Some(certificate)),
        post_json(RENEWALS, json!({ "csr": csr_for_subject(&subject) })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let renewed = client_certificate(&read_json(response).await);
    assert_eq!(certificate_subject(&renewed).unwrap(), subject);
}

#[tokio::test]
async fn renewal_for_another_subject_is_rejected() {
    let app = TestApp::new();
    let certificate = app.onboard_application("orders").await;

    let mut subject: CsrSubject = certificate_subject(&certificate).unwrap();
    subject.organizational_unit = "finance".to_string();

    let response = send(
        app.external_with_peer(Some(certificate)),
        post_json(RENEWALS, json!({ "csr": csr_for_subject(&subject) })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "CSR: Invalid organizational unit provided.");
}

#[tokio::test]
async fn forwarded_subject_header_is_trusted_when_configured() {
    let mut config = certbridge::AppConfig::default();
    config.identity.forwarded_subject_header = Some("x-forwarded-client-subject".to_string());
    let app = TestApp::with_config(config);

    let response = send(
        app.external(),
        axum::http::Request::builder()
            .uri("/v1/runtimes/management/info")
            .header("x-forwarded-client-subject", "OU=OrgUnit,O=Organization,L=Waldorf,ST=Waldorf,C=DE,CN=@cluster")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["clientIdentity"], json!({"kind": "cluster", "tenant": "", "group": ""}));
    assert_eq!(body["urls"]["renewCertUrl"], "https://localhost:8081/v1/runtimes/certificates/renewals");
}

#[tokio::test]
async fn multi_tenant_identity_matching_defaults_survives_the_certificate_round_trip() {
    let app = TestApp::multi_tenant();

    let response = send(
        app.internal(),
        axum::http::Request::builder()
            .method("POST")
            .uri("/v1/applications/tokens")
            .header("Application", "orders")
            .header("Tenant", "Organization")
            .header("Group", "OrgUnit")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = read_json(response).await["token"].as_str().unwrap().to_string();

    let subject = "OU=OrgUnit,O=Organization,L=Waldorf,ST=Waldorf,C=DE,CN=orders";
    let response = send(app.external(), sign_request("/v1/applications/certificates", &token, &csr_for(subject))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let certificate = client_certificate(&read_json(response).await);

    let response = send(app.external_with_peer(Some(certificate)), get("/v1/applications/management/info")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await["clientIdentity"],
        json!({"kind": "application", "application": "orders", "tenant": "Organization", "group": "OrgUnit"})
    );
}
