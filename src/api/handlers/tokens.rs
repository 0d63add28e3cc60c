//! Token issuance, served on the internal listener only.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::info;

use crate::api::dto::TokenResponse;
use crate::api::error::ApiError;
use crate::api::state::ApiState;
use crate::identity::ClientIdentity;

pub const REQUIRED_HEADERS: &str = "Required headers not specified.";

type TokenResult = Result<(StatusCode, Json<TokenResponse>), ApiError>;

/// `POST /v1/applications/tokens`, name from the `Application` header.
pub async fn create_application_token(State(state): State<ApiState>, headers: HeaderMap) -> TokenResult {
    issue_application_token(&state, &headers, None)
}

/// `POST /v1/applications/{name}/tokens`
pub async fn create_named_application_token(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> TokenResult {
    issue_application_token(&state, &headers, Some(&name))
}

/// `POST /v1/runtimes/tokens`
pub async fn create_runtime_token(State(state): State<ApiState>, headers: HeaderMap) -> TokenResult {
    let identity = state.clusters().extract(&headers)?;
    if !state.clusters().is_valid(&identity) {
        return Err(ApiError::bad_request(REQUIRED_HEADERS));
    }
    issue(&state, identity.into())
}

fn issue_application_token(state: &ApiState, headers: &HeaderMap, name: Option<&str>) -> TokenResult {
    let identity = state.applications.extract(headers, name)?;
    if !state.applications.is_valid(&identity) {
        return Err(ApiError::bad_request(REQUIRED_HEADERS));
    }
    issue(state, identity.into())
}

fn issue(state: &ApiState, identity: ClientIdentity) -> TokenResult {
    let token = state.tokens.save(&identity)?;
    let url = state.urls.csr_info_url(identity.kind(), &token);

    info!(
        kind = identity.kind().as_str(),
        tenant = identity.tenant(),
        group = identity.group(),
        "issued provisioning token"
    );
    Ok((StatusCode::CREATED, Json(TokenResponse { url, token })))
}
