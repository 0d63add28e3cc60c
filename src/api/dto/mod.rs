//! Data Transfer Objects for the provisioning API
//!
//! Field names follow the wire contract expected by existing clients
//! (`csrUrl`, `clientCrt`, `runtimeURLs`, ...).

pub mod provisioning;

pub use provisioning::{
    ApiUrls, CertificateInfo, CertificateResponse, CsrInfoResponse, CsrRequest, ManagementInfoResponse,
    ManagementUrls, RuntimeUrls, TokenQuery, TokenResponse,
};
