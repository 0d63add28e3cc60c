//! # Error Handling
//!
//! Error types for the onboarding service. Every failure is classified into
//! one of a small number of kinds so the HTTP boundary can decide what the
//! caller is allowed to see.

pub mod tls;

pub use tls::TlsError;

use std::fmt;

/// Custom result type for certbridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// CSR Subject fields, in the order they are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectField {
    Country,
    Organization,
    OrganizationalUnit,
    Locality,
    Province,
    CommonName,
}

impl SubjectField {
    /// Human readable name used in client-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            SubjectField::Country => "country",
            SubjectField::Organization => "organization",
            SubjectField::OrganizationalUnit => "organizational unit",
            SubjectField::Locality => "locality",
            SubjectField::Province => "province",
            SubjectField::CommonName => "CName",
        }
    }
}

impl fmt::Display for SubjectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Main error type for certbridge
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed, unparseable or unverifiable client input
    #[error("{0}")]
    BadRequest(String),

    /// Well-formed input that does not match what was expected
    #[error("{message}")]
    WrongInput { field: SubjectField, message: String },

    /// Missing, expired or already consumed token
    #[error("{0}")]
    Forbidden(String),

    /// Token store miss; only surfaced to trusted internal callers
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The entropy source failed
    #[error("Token generation error: {0}")]
    Generation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new bad request error
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a wrong input error for a missing Subject field
    pub fn missing_field(field: SubjectField) -> Self {
        Self::WrongInput { field, message: format!("CSR: No {} provided.", field) }
    }

    /// Create a wrong input error for a mismatched Subject field
    pub fn invalid_field(field: SubjectField) -> Self {
        Self::WrongInput { field, message: format!("CSR: Invalid {} provided.", field) }
    }

    /// Create a new forbidden error
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new token generation error
    pub fn generation<S: Into<String>>(message: S) -> Self {
        Self::Generation(message.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}

impl From<TlsError> for Error {
    fn from(error: TlsError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::Config(format!("Configuration loading failed: {}", error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::Config(format!("Validation failed: {}", message))
    }
}
