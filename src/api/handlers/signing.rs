//! CSR info and signing for token holders.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{info, warn};

use crate::api::dto::{ApiUrls, CertificateInfo, CertificateResponse, CsrInfoResponse, CsrRequest};
use crate::api::error::{ApiError, INVALID_BASE64};
use crate::api::state::ApiState;
use crate::certificates::{load_csr, validate_subject, CertificateRequest};
use crate::errors::Error;
use crate::identity::{ClientIdentity, IdentityContext};
use crate::observability::metrics;

/// `GET|POST /v1/{applications|runtimes}/signingRequests/info?token=`
pub async fn csr_info(
    State(state): State<ApiState>,
    Extension(context): Extension<IdentityContext>,
) -> Result<Json<CsrInfoResponse>, ApiError> {
    let identity = context.identity();
    let kind = identity.kind();
    let token = token_of(&context)?;
    let subject = identity.to_subject(state.subject_defaults());

    Ok(Json(CsrInfoResponse {
        csr_url: state.urls.csr_url(kind, token),
        api: ApiUrls {
            certificates_url: state.urls.certificates_url(kind),
            info_url: state.urls.management_info_url(kind),
            runtime_urls: state.urls.runtime_urls(identity),
        },
        certificate: CertificateInfo::for_subject(subject.to_string()),
    }))
}

/// `POST /v1/{applications|runtimes}/certificates?token=`
///
/// The token is consumed only after the CSR passed validation, so a rejected
/// CSR can be corrected and resubmitted with the same token.
pub async fn sign_csr(
    State(state): State<ApiState>,
    Extension(context): Extension<IdentityContext>,
    payload: Result<Json<CsrRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CertificateResponse>), ApiError> {
    let Json(request) = payload?;
    let identity = context.identity();
    let token = token_of(&context)?;

    let csr = decode_csr(&request.csr)?;
    check_subject(&state, &csr, identity)?;

    let consumed: ClientIdentity = state.tokens.consume(token).map_err(|err| {
        warn!(error = %err, "token was consumed by a concurrent request");
        metrics::record_token_rejected("consumed");
        ApiError::invalid_token()
    })?;
    if &consumed != identity {
        return Err(ApiError::invalid_token());
    }
    metrics::record_token_consumed(consumed.kind().as_str());

    let chain = state.authority.issue(&csr)?;
    metrics::record_certificate_issued(consumed.kind().as_str(), false);
    info!(kind = consumed.kind().as_str(), subject = %csr.subject(), "issued client certificate");

    Ok((StatusCode::CREATED, Json(CertificateResponse::from(chain))))
}

/// Base64 decode then parse a CSR submitted in a request body.
pub(crate) fn decode_csr(encoded: &str) -> Result<CertificateRequest, ApiError> {
    let bytes = STANDARD.decode(encoded.trim()).map_err(|_| {
        metrics::record_csr_rejected("base64");
        ApiError::bad_request(INVALID_BASE64)
    })?;

    load_csr(&bytes).map_err(|err| {
        metrics::record_csr_rejected("malformed");
        ApiError::from(err)
    })
}

/// The CSR Subject must be exactly the one derived from `identity`.
pub(crate) fn check_subject(
    state: &ApiState,
    csr: &CertificateRequest,
    identity: &ClientIdentity,
) -> Result<(), ApiError> {
    let expected = identity.to_subject(state.subject_defaults());
    validate_subject(csr, &expected).map_err(|err| {
        warn!(error = %err, "CSR subject does not match identity");
        metrics::record_csr_rejected("subject");
        ApiError::from(err)
    })
}

fn token_of(context: &IdentityContext) -> Result<&str, ApiError> {
    context
        .token()
        .ok_or_else(|| Error::internal("token route reached without a token identity").into())
}
