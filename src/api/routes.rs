//! Routers for the internal (token issuance) and external (client facing) listeners.

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    routing::{get, post},
    BoxError, Router,
};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::identity::IdentityKind;

use super::error::ApiError;
use super::handlers::{
    create_application_token, create_named_application_token, create_runtime_token, csr_info,
    health_handler, management_info, renew_certificate, sign_csr,
};
use super::middleware::{require_certificate, require_token, track_http_metrics};
use super::state::ApiState;
use super::urls::{kind_segment, API_PREFIX};

/// Token issuance. Must only be reachable from trusted callers.
pub fn internal_router(state: ApiState, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route(&format!("{API_PREFIX}/applications/tokens"), post(create_application_token))
        .route(&format!("{API_PREFIX}/applications/{{name}}/tokens"), post(create_named_application_token))
        .route(&format!("{API_PREFIX}/runtimes/tokens"), post(create_runtime_token))
        .route("/health", get(health_handler))
        .with_state(state);

    with_common_layers(router, server)
}

/// CSR info, signing, management info and renewal for both kinds.
pub fn external_router(state: ApiState, server: &ServerConfig) -> Router {
    let router = Router::new()
        .nest(&kind_prefix(IdentityKind::Application), kind_routes(&state, IdentityKind::Application))
        .nest(&kind_prefix(IdentityKind::Cluster), kind_routes(&state, IdentityKind::Cluster))
        .route("/health", get(health_handler))
        .with_state(state);

    with_common_layers(router, server)
}

fn kind_prefix(kind: IdentityKind) -> String {
    format!("{API_PREFIX}/{}", kind_segment(kind))
}

fn kind_routes(state: &ApiState, kind: IdentityKind) -> Router<ApiState> {
    let guard = (state.clone(), kind);

    let token_routes = Router::new()
        .route("/signingRequests/info", get(csr_info).post(csr_info))
        .route("/certificates", post(sign_csr))
        .route_layer(middleware::from_fn_with_state(guard.clone(), require_token));

    let certificate_routes = Router::new()
        .route("/management/info", get(management_info))
        .route("/certificates/renewals", post(renew_certificate))
        .route_layer(middleware::from_fn_with_state(guard, require_certificate));

    token_routes.merge(certificate_routes)
}

fn with_common_layers(router: Router, server: &ServerConfig) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| crate::request_span!(request.method(), request.uri().path()));

    router.layer(middleware::from_fn(track_http_metrics)).layer(
        ServiceBuilder::new()
            .layer(trace_layer)
            .layer(HandleErrorLayer::new(handle_layer_error))
            .layer(TimeoutLayer::new(server.timeout()))
            .layer(DefaultBodyLimit::max(server.max_body_size)),
    )
}

/// Errors raised by tower layers rather than handlers.
async fn handle_layer_error(error: BoxError) -> ApiError {
    if error.is::<tower::timeout::error::Elapsed>() {
        ApiError::Timeout
    } else {
        ApiError::Internal(format!("unhandled middleware error: {}", error))
    }
}
