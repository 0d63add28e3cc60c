//! Axum middleware that establishes who a request acts for.
//!
//! Token protected routes resolve the `token` query parameter, certificate
//! protected routes read the verified client certificate. Either way the
//! resulting identity is attached once to the request extensions as an
//! [`IdentityContext`](crate::identity::IdentityContext).

use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, Query, State},
    http::{Request, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{field, warn};

use crate::api::dto::TokenQuery;
use crate::api::error::ApiError;
use crate::api::server::ClientConnection;
use crate::api::state::ApiState;
use crate::identity::{ClientIdentity, IdentityKind, IdentitySource};
use crate::observability::metrics;

/// State for the identity middleware: shared state plus the kind a route serves.
pub type GuardState = (ApiState, IdentityKind);

/// Resolve the provisioning token without consuming it.
pub async fn require_token(
    State((state, kind)): State<GuardState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = token_from_uri(request.uri()) else {
        warn!(path = %request.uri().path(), "request without provisioning token");
        metrics::record_token_rejected("missing");
        return Err(ApiError::invalid_token());
    };

    let identity: ClientIdentity = match state.tokens.resolve(&token) {
        Ok(identity) => identity,
        Err(err) => {
            warn!(error = %err, "provisioning token not accepted");
            metrics::record_token_rejected("unknown");
            return Err(ApiError::invalid_token());
        }
    };

    if identity.kind() != kind {
        warn!(expected = kind.as_str(), actual = identity.kind().as_str(), "token presented for the wrong kind");
        metrics::record_token_rejected("wrong_kind");
        return Err(ApiError::invalid_token());
    }

    tracing::Span::current().record("identity", field::debug(&identity));
    identity.extend_carrier(request.extensions_mut(), IdentitySource::Token(token))?;
    Ok(next.run(request).await)
}

/// Derive the identity from the client certificate presented on the connection.
pub async fn require_certificate(
    State((state, kind)): State<GuardState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let peer_certificate = request
        .extensions()
        .get::<ConnectInfo<ClientConnection>>()
        .and_then(|ConnectInfo(connection)| connection.peer_certificate.clone());

    let identity = state.certificates.extract(peer_certificate.as_deref(), request.headers())?;

    if identity.kind() != kind {
        warn!(expected = kind.as_str(), actual = identity.kind().as_str(), "certificate presented for the wrong kind");
        return Err(ApiError::forbidden("Client certificate does not grant access to this resource."));
    }

    tracing::Span::current().record("identity", field::debug(&identity));
    identity.extend_carrier(request.extensions_mut(), IdentitySource::Certificate)?;
    Ok(next.run(request).await)
}

/// Count requests and latency per matched route.
pub async fn track_http_metrics(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    metrics::record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}

fn token_from_uri(uri: &Uri) -> Option<String> {
    let Query(query) = Query::<TokenQuery>::try_from_uri(uri).ok()?;
    query.token.map(|token| token.trim().to_string()).filter(|token| !token.is_empty())
}
