use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::error;

use crate::errors::Error;

pub const INVALID_TOKEN: &str = "Invalid token.";
pub const INVALID_BASE64: &str =
    "There was an error while parsing the base64 content. An incorrect value was provided.";
const INTERNAL_MESSAGE: &str = "Internal server error.";
const TIMEOUT_MESSAGE: &str = "Request timed out.";
const PAYLOAD_TOO_LARGE_MESSAGE: &str = "Request body too large.";

/// Errors as seen by HTTP clients.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    PayloadTooLarge,
    Timeout,
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn invalid_token() -> Self {
        ApiError::Forbidden(INVALID_TOKEN.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::Forbidden(msg) => msg,
            ApiError::PayloadTooLarge => PAYLOAD_TOO_LARGE_MESSAGE.to_string(),
            ApiError::Timeout => TIMEOUT_MESSAGE.to_string(),
            ApiError::Internal(detail) => {
                error!(error = %detail, "request failed with internal error");
                INTERNAL_MESSAGE.to_string()
            }
        };

        (status, Json(ErrorBody { code: status.as_u16(), error: message })).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::BadRequest(msg) | Error::WrongInput { message: msg, .. } => ApiError::BadRequest(msg),
            // A token boundary never reveals whether a token existed.
            Error::Forbidden(_) | Error::NotFound(_) => ApiError::invalid_token(),
            Error::Serialization(msg)
            | Error::Generation(msg)
            | Error::Config(msg)
            | Error::Transport(msg)
            | Error::Internal(msg) => ApiError::Internal(msg),
            Error::Io(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SubjectField;
    use axum::body::to_bytes;
    use tracing_test::traced_test;

    async fn body_of(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn wrong_input_is_bad_request_with_field_message() {
        let (status, body) = body_of(Error::invalid_field(SubjectField::CommonName).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"code": 400, "error": "CSR: Invalid CName provided."}));
    }

    #[tokio::test]
    async fn not_found_collapses_to_forbidden() {
        let (status, body) = body_of(Error::not_found("token abc").into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], INVALID_TOKEN);
    }

    #[tokio::test]
    #[traced_test]
    async fn internal_details_are_logged_not_exposed() {
        let (status, body) = body_of(Error::internal("CA key at /etc/secret unreadable").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_MESSAGE);
        assert!(!body.to_string().contains("/etc/secret"));
        assert!(logs_contain("CA key at /etc/secret unreadable"));
    }
}
