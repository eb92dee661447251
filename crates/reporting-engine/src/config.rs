//! Engine configuration.

use serde::{Deserialize, Serialize};

/// API groups of the watched custom resources.
///
/// Annotation and label keys on the watched objects are prefixed with these
/// domains (`<poolboy>/resource-claim-namespace`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDomains {
    pub anarchy_domain: String,
    pub anarchy_api_version: String,
    pub babylon_domain: String,
    pub babylon_api_version: String,
    pub poolboy_domain: String,
    pub poolboy_api_version: String,
}

impl Default for ApiDomains {
    fn default() -> Self {
        Self {
            anarchy_domain: "anarchy.gpte.redhat.com".to_string(),
            anarchy_api_version: "v1".to_string(),
            babylon_domain: "babylon.gpte.redhat.com".to_string(),
            babylon_api_version: "v1".to_string(),
            poolboy_domain: "poolboy.gpte.redhat.com".to_string(),
            poolboy_api_version: "v1".to_string(),
        }
    }
}

impl ApiDomains {
    /// `<poolboy domain>/<name>`
    #[must_use]
    pub fn poolboy_key(&self, name: &str) -> String {
        format!("{}/{name}", self.poolboy_domain)
    }

    /// `<babylon domain>/<name>`
    #[must_use]
    pub fn babylon_key(&self, name: &str) -> String {
        format!("{}/{name}", self.babylon_domain)
    }

    /// `apiVersion` of AnarchySubject objects.
    #[must_use]
    pub fn anarchy_api_version(&self) -> String {
        format!("{}/{}", self.anarchy_domain, self.anarchy_api_version)
    }
}

/// Rules for classifying and enriching requesters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentPolicy {
    /// Mail domain of employees, looked up in the corporate directory.
    pub corporate_domain: String,
    /// Mail domain of the strategic partner.
    pub partner_domain: String,
    /// Mailbox billed when no chargeback manager is found.
    pub default_mailbox: String,
    /// Top-of-hierarchy managers; reaching one ends the chain walk.
    pub sentinels: Vec<String>,
    /// Maximum manager hops walked before giving up.
    pub max_chain_depth: usize,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            corporate_domain: "redhat.com".to_string(),
            partner_domain: "ibm.com".to_string(),
            default_mailbox: "gpte@redhat.com".to_string(),
            sentinels: vec![
                "bod@redhat.com".to_string(),
                "pcormier@redhat.com".to_string(),
            ],
            max_chain_depth: 50,
        }
    }
}

/// Everything the dispatcher needs besides its collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub domains: ApiDomains,
    pub enrichment: EnrichmentPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let domains = ApiDomains::default();
        assert_eq!(
            domains.poolboy_key("resource-claim-namespace"),
            "poolboy.gpte.redhat.com/resource-claim-namespace"
        );
        assert_eq!(
            domains.babylon_key("catalogDisplayName"),
            "babylon.gpte.redhat.com/catalogDisplayName"
        );
        assert_eq!(domains.anarchy_api_version(), "anarchy.gpte.redhat.com/v1");
    }
}
