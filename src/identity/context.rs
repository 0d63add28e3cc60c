//! Request-scoped carrier for the resolved identity.

use http::Extensions;

use crate::errors::{Error, Result};

use super::model::ClientIdentity;

/// How the identity of a request was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// A provisioning token presented as a query parameter.
    Token(String),
    /// The client certificate Subject.
    Certificate,
}

/// Identity attached to a request by middleware. Attached once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    identity: ClientIdentity,
    source: IdentitySource,
}

impl IdentityContext {
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn token(&self) -> Option<&str> {
        match &self.source {
            IdentitySource::Token(token) => Some(token),
            IdentitySource::Certificate => None,
        }
    }
}

impl ClientIdentity {
    /// Attach this identity to the request extensions.
    ///
    /// Fails if an identity was already attached to the same request.
    pub fn extend_carrier(self, extensions: &mut Extensions, source: IdentitySource) -> Result<()> {
        if extensions.get::<IdentityContext>().is_some() {
            return Err(Error::internal("request identity attached twice"));
        }
        extensions.insert(IdentityContext { identity: self, source });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ApplicationIdentity, ClusterIdentity};

    #[test]
    fn identity_is_attached_once() {
        let mut extensions = Extensions::new();
        let identity: ClientIdentity = ApplicationIdentity::new("orders", "acme", "retail").into();

        identity.clone().extend_carrier(&mut extensions, IdentitySource::Token("t".into())).unwrap();

        let context = extensions.get::<IdentityContext>().unwrap();
        assert_eq!(context.identity(), &identity);
        assert_eq!(context.token(), Some("t"));

        let second: ClientIdentity = ClusterIdentity::new("acme", "retail").into();
        assert!(second.extend_carrier(&mut extensions, IdentitySource::Certificate).is_err());
        assert_eq!(extensions.get::<IdentityContext>().unwrap().identity(), &identity);
    }
}
