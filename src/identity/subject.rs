//! Mapping between client identities and X.509 Subjects.

use std::fmt;

use serde::Serialize;

use crate::config::CertificateConfig;
use crate::errors::{Error, Result};

use super::model::{ApplicationIdentity, ClientIdentity};
use super::strategy::ClusterIdentityStrategy;

/// Common Name carried by cluster certificates. `@` never appears in a valid
/// application name.
pub const CLUSTER_COMMON_NAME: &str = "@cluster";

/// Subject components not derived from the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDefaults {
    pub country: String,
    pub organization: String,
    pub organizational_unit: String,
    pub locality: String,
    pub province: String,
}

impl From<&CertificateConfig> for SubjectDefaults {
    fn from(config: &CertificateConfig) -> Self {
        Self {
            country: config.country.clone(),
            organization: config.organization.clone(),
            organizational_unit: config.organizational_unit.clone(),
            locality: config.locality.clone(),
            province: config.province.clone(),
        }
    }
}

/// The Subject a CSR must carry for a given identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrSubject {
    pub common_name: String,
    pub country: String,
    pub organization: String,
    pub organizational_unit: String,
    pub locality: String,
    pub province: String,
}

impl CsrSubject {
    pub fn for_identity(identity: &ClientIdentity, defaults: &SubjectDefaults) -> Self {
        let common_name = match identity {
            ClientIdentity::Application(app) => app.application.clone(),
            ClientIdentity::Cluster(_) => CLUSTER_COMMON_NAME.to_string(),
        };

        Self {
            common_name,
            country: defaults.country.clone(),
            organization: or_default(identity.tenant(), &defaults.organization),
            organizational_unit: or_default(identity.group(), &defaults.organizational_unit),
            locality: defaults.locality.clone(),
            province: defaults.province.clone(),
        }
    }

    /// Recover the identity a Subject was issued for.
    ///
    /// `clusters` decides how Organization and Organizational Unit map back
    /// to tenant and group. The result must be complete for that strategy.
    pub fn to_identity(
        &self,
        defaults: &SubjectDefaults,
        clusters: &dyn ClusterIdentityStrategy,
    ) -> Result<ClientIdentity> {
        if self.common_name.is_empty() {
            return Err(Error::bad_request("Certificate Subject has no Common Name"));
        }

        let cluster = clusters.cluster_from_subject(&self.organization, &self.organizational_unit, defaults)?;
        let identity: ClientIdentity = if self.common_name == CLUSTER_COMMON_NAME {
            cluster.into()
        } else {
            ApplicationIdentity::new(self.common_name.clone(), cluster.tenant, cluster.group).into()
        };

        if !identity.is_complete(clusters) {
            return Err(Error::bad_request("Certificate Subject does not describe a complete identity"));
        }
        Ok(identity)
    }

    /// Parse a Subject rendered as comma separated `KEY=value` pairs, in any order.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut subject = CsrSubject::default();

        for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::bad_request(format!("Malformed Subject component '{}'", part)))?;
            let value = value.trim().to_string();
            match key.trim().to_ascii_uppercase().as_str() {
                "CN" => subject.common_name = value,
                "C" => subject.country = value,
                "O" => subject.organization = value,
                "OU" => subject.organizational_unit = value,
                "L" => subject.locality = value,
                "ST" => subject.province = value,
                _ => {}
            }
        }

        Ok(subject)
    }
}

impl fmt::Display for CsrSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OU={},O={},L={},ST={},C={},CN={}",
            self.organizational_unit,
            self.organization,
            self.locality,
            self.province,
            self.country,
            self.common_name
        )
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::utility::test_support::csr_pem;
    use crate::certificates::{load_csr, validate_subject};
    use crate::identity::{ClusterIdentity, DisabledClusterStrategy, HeaderClusterStrategy};
    use proptest::prelude::*;

    fn defaults() -> SubjectDefaults {
        SubjectDefaults::from(&CertificateConfig::default())
    }

    #[test]
    fn application_subject_uses_identity_fields() {
        let identity = ApplicationIdentity::new("orders", "acme", "retail").into();
        let subject = CsrSubject::for_identity(&identity, &defaults());

        assert_eq!(subject.common_name, "orders");
        assert_eq!(subject.organization, "acme");
        assert_eq!(subject.organizational_unit, "retail");
        assert_eq!(subject.to_string(), "OU=retail,O=acme,L=Waldorf,ST=Waldorf,C=DE,CN=orders");
    }

    #[test]
    fn single_tenant_subject_falls_back_to_defaults() {
        let identity = ApplicationIdentity::new("orders", "", "").into();
        let subject = CsrSubject::for_identity(&identity, &defaults());

        assert_eq!(subject.to_string(), "OU=OrgUnit,O=Organization,L=Waldorf,ST=Waldorf,C=DE,CN=orders");
        assert_eq!(subject.to_identity(&defaults(), &DisabledClusterStrategy).unwrap(), identity);
    }

    #[test]
    fn multi_tenant_identity_matching_defaults_is_kept_verbatim() {
        let identity: ClientIdentity = ApplicationIdentity::new("orders", "Organization", "OrgUnit").into();
        let subject = CsrSubject::for_identity(&identity, &defaults());

        assert_eq!(subject.to_identity(&defaults(), &HeaderClusterStrategy).unwrap(), identity);
    }

    #[test]
    fn single_tenant_rejects_foreign_organization() {
        let identity = ApplicationIdentity::new("orders", "acme", "retail").into();
        let subject = CsrSubject::for_identity(&identity, &defaults());

        assert!(matches!(subject.to_identity(&defaults(), &DisabledClusterStrategy), Err(Error::BadRequest(_))));
    }

    #[test]
    fn cluster_subject_uses_reserved_common_name() {
        let identity: ClientIdentity = ClusterIdentity::new("acme", "retail").into();
        let subject = CsrSubject::for_identity(&identity, &defaults());

        assert_eq!(subject.common_name, CLUSTER_COMMON_NAME);
        assert_eq!(subject.to_identity(&defaults(), &HeaderClusterStrategy).unwrap(), identity);
    }

    #[test]
    fn parse_accepts_any_order() {
        let subject = CsrSubject::parse("CN=orders, C=DE, O=acme, OU=retail, L=Waldorf, ST=Waldorf").unwrap();
        assert_eq!(subject.to_string(), "OU=retail,O=acme,L=Waldorf,ST=Waldorf,C=DE,CN=orders");
    }

    #[test]
    fn parse_rejects_components_without_value_separator() {
        assert!(CsrSubject::parse("CN=orders,acme").is_err());
    }

    #[test]
    fn to_identity_requires_components() {
        let mut subject = CsrSubject::for_identity(&ApplicationIdentity::new("orders", "acme", "retail").into(), &defaults());
        subject.common_name.clear();
        assert!(matches!(subject.to_identity(&defaults(), &HeaderClusterStrategy), Err(Error::BadRequest(_))));

        let mut subject = CsrSubject::for_identity(&ApplicationIdentity::new("orders", "acme", "retail").into(), &defaults());
        subject.organizational_unit.clear();
        assert!(matches!(subject.to_identity(&defaults(), &HeaderClusterStrategy), Err(Error::BadRequest(_))));
    }

    fn any_identity() -> impl Strategy<Value = ClientIdentity> {
        let application = "[a-z0-9]([-a-z0-9]{0,20}[a-z0-9])?";
        let part = "[A-Za-z0-9 ._-]{0,16}";
        prop_oneof![
            (application, part, part).prop_map(|(app, tenant, group)| ApplicationIdentity::new(app, tenant, group).into()),
            (part, part).prop_map(|(tenant, group)| ClusterIdentity::new(tenant, group).into()),
        ]
    }

    proptest! {
        #[test]
        fn rendered_subject_parses_back_to_identity(
            application in "[a-z0-9]([-a-z0-9]{0,20}[a-z0-9])?",
            tenant in "[A-Za-z0-9 _-]{1,16}",
            group in "[A-Za-z0-9 _-]{1,16}",
        ) {
            prop_assume!(tenant.trim() == tenant && group.trim() == group);

            let identity: ClientIdentity = ApplicationIdentity::new(application, tenant, group).into();
            let rendered = CsrSubject::for_identity(&identity, &defaults()).to_string();
            let parsed = CsrSubject::parse(&rendered).unwrap();

            prop_assert_eq!(parsed.to_identity(&defaults(), &HeaderClusterStrategy).unwrap(), identity);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn csr_for_identity_subject_always_validates(identity in any_identity()) {
            let expected = CsrSubject::for_identity(&identity, &defaults());
            let csr = load_csr(csr_pem(&expected).as_bytes()).unwrap();

            prop_assert!(validate_subject(&csr, &expected).is_ok());
        }
    }
}
