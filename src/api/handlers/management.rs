//! Endpoints for clients that already hold a certificate.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::api::dto::{CertificateInfo, CertificateResponse, CsrRequest, ManagementInfoResponse, ManagementUrls};
use crate::api::error::ApiError;
use crate::api::state::ApiState;
use crate::identity::IdentityContext;
use crate::observability::metrics;

use super::signing::{check_subject, decode_csr};

/// `GET /v1/{applications|runtimes}/management/info`
pub async fn management_info(
    State(state): State<ApiState>,
    Extension(context): Extension<IdentityContext>,
) -> Json<ManagementInfoResponse> {
    let identity = context.identity().clone();
    let runtime = state.urls.runtime_urls(&identity);
    let subject = identity.to_subject(state.subject_defaults());

    Json(ManagementInfoResponse {
        urls: ManagementUrls {
            events_url: runtime.as_ref().map(|urls| urls.events_url.clone()),
            metadata_url: runtime.map(|urls| urls.metadata_url),
            renew_cert_url: state.urls.renewal_url(identity.kind()),
        },
        client_identity: identity,
        certificate: CertificateInfo::for_subject(subject.to_string()),
    })
}

/// `POST /v1/{applications|runtimes}/certificates/renewals`
pub async fn renew_certificate(
    State(state): State<ApiState>,
    Extension(context): Extension<IdentityContext>,
    payload: Result<Json<CsrRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CertificateResponse>), ApiError> {
    let Json(request) = payload?;
    let identity = context.identity();

    let csr = decode_csr(&request.csr)?;
    check_subject(&state, &csr, identity)?;

    let chain = state.authority.issue(&csr)?;
    metrics::record_certificate_issued(identity.kind().as_str(), true);
    info!(kind = identity.kind().as_str(), subject = %csr.subject(), "renewed client certificate");

    Ok((StatusCode::CREATED, Json(CertificateResponse::from(chain))))
}
