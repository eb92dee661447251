//! Corporate directory lookups.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ldap3::SearchEntry;
use tracing::{debug, instrument};

use reporting_connector::directory::{dn_to_email, DirectoryEntry, DirectorySource};
use reporting_connector::error::ConnectorResult;

use crate::config::CorporateDirectoryConfig;
use crate::filter::person_filter;
use crate::session::LdapSession;

/// First value of an attribute, matched case-insensitively.
pub(crate) fn first_value(entry: &SearchEntry, name: &str) -> Option<String> {
    entry
        .attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .filter(|v| !v.is_empty())
        .cloned()
}

/// Corporate LDAP directory, searched by mail or alias across its bases.
pub struct CorporateDirectory {
    config: CorporateDirectoryConfig,
    session: LdapSession,
}

impl CorporateDirectory {
    /// Create a directory client; the connection is opened on first search.
    pub fn new(config: CorporateDirectoryConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let session = LdapSession::new(config.connection.clone())?;
        Ok(Self { config, session })
    }

    /// Map a raw search entry to a directory record.
    pub fn to_directory_entry(&self, entry: &SearchEntry) -> DirectoryEntry {
        let attributes: BTreeMap<String, String> = entry
            .attrs
            .iter()
            .filter_map(|(k, v)| v.first().map(|first| (k.clone(), first.clone())))
            .collect();

        let manager_email = if self.config.requests_manager() {
            first_value(entry, "manager")
                .and_then(|dn| dn_to_email(&dn, &self.config.mail_domain))
        } else {
            None
        };

        DirectoryEntry {
            dn: entry.dn.clone(),
            uid: first_value(entry, "uid"),
            mail: first_value(entry, "mail"),
            cn: first_value(entry, "cn"),
            title: first_value(entry, "title"),
            cost_center: first_value(entry, &self.config.cost_center_attribute),
            geo: first_value(entry, &self.config.geo_attribute),
            manager_email,
            attributes,
        }
    }
}

#[async_trait]
impl DirectorySource for CorporateDirectory {
    #[instrument(skip(self))]
    async fn find_person(&self, email: &str) -> ConnectorResult<Option<DirectoryEntry>> {
        let filter = person_filter(&self.config.alias_attribute, email);

        for base in self.config.search_bases.iter().filter(|b| !b.trim().is_empty()) {
            let entries = self
                .session
                .search(base, &filter, &self.config.search_attributes)
                .await?;
            if let Some(entry) = entries.first() {
                return Ok(Some(self.to_directory_entry(entry)));
            }
            debug!(base = %base, "Person not found under base, trying next");
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LdapConnection;
    use std::collections::HashMap;

    fn entry(attrs: &[(&str, &str)]) -> SearchEntry {
        SearchEntry {
            dn: "uid=alice,ou=users,dc=redhat,dc=com".to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), vec![(*v).to_string()]))
                .collect::<HashMap<_, _>>(),
            bin_attrs: HashMap::new(),
        }
    }

    fn directory() -> CorporateDirectory {
        let conn = LdapConnection::new("ldap.corp", "uid=svc,dc=redhat,dc=com").with_password("pw");
        CorporateDirectory::new(CorporateDirectoryConfig::new(
            conn,
            vec!["ou=users,dc=redhat,dc=com".into()],
        ))
        .unwrap()
    }

    #[test]
    fn test_entry_mapping() {
        let dir = directory();
        let mapped = dir.to_directory_entry(&entry(&[
            ("uid", "alice"),
            ("mail", "alice@redhat.com"),
            ("cn", "Alice Smith"),
            ("title", "Engineer"),
            ("rhatCostCenter", "664"),
            ("rhatGeo", "NA"),
            ("manager", "uid=bob,ou=users,dc=redhat,dc=com"),
        ]));

        assert_eq!(mapped.uid.as_deref(), Some("alice"));
        assert_eq!(mapped.cost_center.as_deref(), Some("664"));
        assert_eq!(mapped.geo.as_deref(), Some("NA"));
        assert_eq!(mapped.manager_email.as_deref(), Some("bob@redhat.com"));
        assert_eq!(mapped.attributes.get("cn").map(String::as_str), Some("Alice Smith"));
    }

    #[test]
    fn test_attribute_names_case_insensitive() {
        let dir = directory();
        let mapped = dir.to_directory_entry(&entry(&[("MAIL", "alice@redhat.com"), ("Title", "")]));
        assert_eq!(mapped.mail.as_deref(), Some("alice@redhat.com"));
        assert_eq!(mapped.title, None);
    }

    #[test]
    fn test_manager_ignored_when_not_requested() {
        let conn = LdapConnection::new("ldap.corp", "uid=svc");
        let config = CorporateDirectoryConfig::new(conn, vec!["dc=corp".into()])
            .with_search_attributes("uid,mail");
        let dir = CorporateDirectory::new(config).unwrap();
        let mapped = dir.to_directory_entry(&entry(&[("manager", "uid=bob,dc=corp")]));
        assert_eq!(mapped.manager_email, None);
    }
}
