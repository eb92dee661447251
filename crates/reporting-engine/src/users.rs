//! Requester classification and enrichment.
//!
//! The requester's account gives their mail and names. Employees are then
//! looked up in the corporate directory for cost center, geo, title and
//! manager, and billed to the nearest chargeback manager above them.
//! Partner and external users keep what the account directory knows.

use std::collections::HashMap;

use reporting_connector::directory::AccountEntry;
use reporting_db::models::StudentProfile;
use tracing::{debug, instrument};

use crate::config::EnrichmentPolicy;
use crate::directory::{DirectoryLookup, UserProfile};
use crate::error::EngineResult;
use crate::store::ManagerRef;

pub const COMPANY_CORPORATE: i32 = 16736;
pub const COMPANY_PARTNER: i32 = 13716;
pub const COMPANY_OTHER: i32 = 10000;

pub const PARTNER_CORPORATE: &str = "redhat";
pub const PARTNER_STRATEGIC: &str = "IBM";
pub const PARTNER_OTHER: &str = "partner";

/// Plus-address tags stripped before directory lookups, in priority order.
const PLUS_TAGS: [&str; 3] = ["+generic", "+shared", "+test"];

/// Which population a requester belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserClass {
    Corporate,
    Partner,
    Other,
}

impl UserClass {
    pub fn company_id(&self) -> i32 {
        match self {
            UserClass::Corporate => COMPANY_CORPORATE,
            UserClass::Partner => COMPANY_PARTNER,
            UserClass::Other => COMPANY_OTHER,
        }
    }

    pub fn partner(&self) -> &'static str {
        match self {
            UserClass::Corporate => PARTNER_CORPORATE,
            UserClass::Partner => PARTNER_STRATEGIC,
            UserClass::Other => PARTNER_OTHER,
        }
    }
}

/// A requester ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedUser {
    pub profile: StudentProfile,
    pub manager: Option<ManagerRef>,
    /// Id in the chargeback set, when a billable manager was found.
    pub chargeback_manager_id: Option<i32>,
}

#[derive(Clone)]
pub struct UserEnricher {
    directory: DirectoryLookup,
    policy: EnrichmentPolicy,
}

impl UserEnricher {
    pub fn new(directory: DirectoryLookup, policy: EnrichmentPolicy) -> Self {
        Self { directory, policy }
    }

    pub fn classify(&self, email: &str) -> UserClass {
        let email = email.to_lowercase();
        if email.contains(&format!("@{}", self.policy.corporate_domain)) {
            UserClass::Corporate
        } else if email.contains(&self.policy.partner_domain) {
            UserClass::Partner
        } else {
            UserClass::Other
        }
    }

    /// Build the student profile for an account.
    ///
    /// `chargeback_set` maps lower-cased billable manager emails to ids.
    #[instrument(skip(self, account, chargeback_set), fields(username = %account.uid))]
    pub async fn enrich(
        &self,
        account: &AccountEntry,
        chargeback_set: &HashMap<String, i32>,
    ) -> EngineResult<EnrichedUser> {
        let email = account.mail.trim().to_lowercase();
        let class = self.classify(&email);
        let first_name = account.given_name.as_deref().map(capitalize);
        let last_name = account.surname.as_deref().map(capitalize);
        let full_name = match (&first_name, &last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        };

        let mut profile = StudentProfile {
            email: email.clone(),
            username: Some(account.uid.clone()),
            full_name,
            first_name,
            last_name,
            geo: Some(account.region.clone()),
            partner: Some(class.partner().to_string()),
            title: Some(account.title.clone()),
            check_headcount: true,
            company_id: Some(class.company_id()),
            ..Default::default()
        };

        if class != UserClass::Corporate {
            debug!(class = ?class, "Requester outside the corporate directory");
            return Ok(EnrichedUser {
                profile,
                manager: None,
                chargeback_manager_id: None,
            });
        }

        let lookup_email = strip_plus_tag(&email);

        let chargeback = self
            .directory
            .resolve_chargeback_manager(&lookup_email, chargeback_set)
            .await?;
        let chargeback_manager_id = if chargeback == self.directory.default_mailbox() {
            None
        } else {
            chargeback_set.get(&chargeback).copied()
        };

        let found = self
            .directory
            .resolve_user_profile(
                &lookup_email,
                profile.first_name.as_deref(),
                profile.last_name.as_deref(),
            )
            .await?;

        let manager = found.as_ref().and_then(manager_ref);
        if let Some(UserProfile { entry, .. }) = &found {
            profile.kerberos_id = entry.uid.clone();
            profile.cost_center = entry.cost_center.clone();
            if entry.title.is_some() {
                profile.title = entry.title.clone();
            }
            if entry.geo.is_some() {
                profile.geo = entry.geo.clone();
            }
        } else {
            debug!(email = %lookup_email, "Requester not found in corporate directory");
        }
        if let Some(manager) = &manager {
            profile.manager = manager.name.clone();
            profile.manager_email = Some(manager.email.clone());
        }

        Ok(EnrichedUser {
            profile,
            manager,
            chargeback_manager_id,
        })
    }
}

fn manager_ref(profile: &UserProfile) -> Option<ManagerRef> {
    let email = profile.manager_email()?.to_string();
    let entry = profile.manager.as_ref();
    Some(ManagerRef {
        email,
        name: entry.and_then(|m| m.cn.as_deref()).map(|cn| cn.replace('\'', "")),
        kerberos_id: entry.and_then(|m| m.uid.clone()),
    })
}

/// Remove the first matching plus-address tag.
pub fn strip_plus_tag(email: &str) -> String {
    PLUS_TAGS
        .iter()
        .find(|tag| email.contains(*tag))
        .map(|tag| email.replacen(*tag, "", 1))
        .unwrap_or_else(|| email.to_string())
}

/// First character upper-cased, the rest lower-cased, surrounding space removed.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use reporting_connector::directory::{DirectoryEntry, DirectorySource};
    use reporting_connector::error::ConnectorResult;

    struct Directory(Vec<DirectoryEntry>);

    #[async_trait]
    impl DirectorySource for Directory {
        async fn find_person(&self, email: &str) -> ConnectorResult<Option<DirectoryEntry>> {
            Ok(self
                .0
                .iter()
                .find(|e| e.mail.as_deref() == Some(email))
                .cloned())
        }
    }

    fn person(mail: &str, uid: &str, cn: &str, manager: Option<&str>) -> DirectoryEntry {
        DirectoryEntry {
            dn: format!("uid={uid},ou=users,dc=redhat,dc=com"),
            uid: Some(uid.into()),
            mail: Some(mail.into()),
            cn: Some(cn.into()),
            title: Some("Engineer".into()),
            cost_center: Some("420".into()),
            geo: Some("NA".into()),
            manager_email: manager.map(str::to_string),
            ..Default::default()
        }
    }

    fn enricher(entries: Vec<DirectoryEntry>) -> UserEnricher {
        let policy = EnrichmentPolicy::default();
        UserEnricher::new(
            DirectoryLookup::new(Arc::new(Directory(entries)), policy.clone()),
            policy,
        )
    }

    fn account(mail: &str) -> AccountEntry {
        AccountEntry {
            uid: "alice".into(),
            mail: mail.into(),
            given_name: Some("alice".into()),
            surname: Some("SMITH".into()),
            title: "other".into(),
            region: "EMEA".into(),
            partner: "partner".into(),
        }
    }

    #[test]
    fn test_strip_plus_tag() {
        assert_eq!(strip_plus_tag("alice+generic@redhat.com"), "alice@redhat.com");
        assert_eq!(strip_plus_tag("alice+shared@redhat.com"), "alice@redhat.com");
        assert_eq!(strip_plus_tag("alice+test@redhat.com"), "alice@redhat.com");
        assert_eq!(strip_plus_tag("alice+other@redhat.com"), "alice+other@redhat.com");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize(" aLICE "), "Alice");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn test_corporate_user_is_enriched() {
        let enricher = enricher(vec![
            person("alice@redhat.com", "asmith", "Alice Smith", Some("bob@redhat.com")),
            person("bob@redhat.com", "bjones", "Bob O'Jones", Some("carol@redhat.com")),
            person("carol@redhat.com", "cdoe", "Carol Doe", None),
        ]);
        let set = HashMap::from([("carol@redhat.com".to_string(), 7)]);

        let user = enricher
            .enrich(&account("alice+generic@redhat.com"), &set)
            .await
            .unwrap();

        let p = &user.profile;
        assert_eq!(p.email, "alice+generic@redhat.com");
        assert_eq!(p.full_name.as_deref(), Some("Alice Smith"));
        assert_eq!(p.partner.as_deref(), Some("redhat"));
        assert_eq!(p.company_id, Some(COMPANY_CORPORATE));
        assert_eq!(p.kerberos_id.as_deref(), Some("asmith"));
        assert_eq!(p.cost_center.as_deref(), Some("420"));
        assert_eq!(p.geo.as_deref(), Some("NA"));
        assert_eq!(p.title.as_deref(), Some("Engineer"));
        assert_eq!(p.manager.as_deref(), Some("Bob OJones"));
        assert_eq!(p.manager_email.as_deref(), Some("bob@redhat.com"));
        assert!(p.check_headcount);

        let manager = user.manager.unwrap();
        assert_eq!(manager.kerberos_id.as_deref(), Some("bjones"));
        assert_eq!(user.chargeback_manager_id, Some(7));
    }

    #[tokio::test]
    async fn test_corporate_user_without_billable_manager() {
        let enricher = enricher(vec![person("alice@redhat.com", "asmith", "Alice Smith", None)]);
        let user = enricher
            .enrich(&account("alice@redhat.com"), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(user.chargeback_manager_id, None);
        assert_eq!(user.manager, None);
    }

    #[tokio::test]
    async fn test_partner_user_has_no_identity_fields() {
        let enricher = enricher(vec![]);
        let user = enricher
            .enrich(&account("alice@ibm.com"), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(user.profile.partner.as_deref(), Some("IBM"));
        assert_eq!(user.profile.company_id, Some(COMPANY_PARTNER));
        assert_eq!(user.profile.kerberos_id, None);
        assert_eq!(user.profile.cost_center, None);
        assert_eq!(user.profile.manager, None);
        assert_eq!(user.profile.geo.as_deref(), Some("EMEA"));
    }

    #[tokio::test]
    async fn test_other_user() {
        let enricher = enricher(vec![]);
        let user = enricher
            .enrich(&account("alice@example.com"), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(user.profile.partner.as_deref(), Some("partner"));
        assert_eq!(user.profile.company_id, Some(COMPANY_OTHER));
        assert_eq!(user.profile.title.as_deref(), Some("other"));
    }
}
