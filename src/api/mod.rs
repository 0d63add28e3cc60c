//! # Provisioning API
//!
//! HTTP surface of the service, split over two listeners:
//!
//! ```text
//! internal  POST /v1/{applications|runtimes}/tokens       → token
//! external  GET  .../signingRequests/info?token=          → CSR info
//!           POST .../certificates?token=                   → certificate chain
//!           GET  .../management/info          (client cert) → URLs + identity
//!           POST .../certificates/renewals    (client cert) → renewed chain
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::ApiError;
pub use routes::{external_router, internal_router};
pub use server::{start_external_server, start_internal_server, ClientConnection};
pub use state::ApiState;
pub use urls::UrlBuilder;
