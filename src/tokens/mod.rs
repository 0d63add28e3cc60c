//! One-time provisioning tokens.
//!
//! A token is an opaque random string that maps to the serialized identity
//! it was issued for. Tokens expire after a per-kind TTL and are consumed by
//! a successful certificate signing.

pub mod service;
pub mod store;

pub use service::TokenService;
pub use store::TokenStore;
