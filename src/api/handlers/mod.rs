//! HTTP request handlers organized by provisioning step

pub mod health;
pub mod management;
pub mod signing;
pub mod tokens;

pub use health::health_handler;
pub use management::{management_info, renew_certificate};
pub use signing::{csr_info, sign_csr};
pub use tokens::{create_application_token, create_named_application_token, create_runtime_token};
