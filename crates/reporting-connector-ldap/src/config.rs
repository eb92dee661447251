//! LDAP adapter configuration
//!
//! Configuration types for the corporate directory and the IPA account
//! directory connections.

use serde::{Deserialize, Serialize};

use reporting_connector::error::{ConnectorError, ConnectorResult};

/// Connection parameters shared by both directories.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConnection {
    /// LDAP server hostname, optionally with `:port`.
    pub host: String,

    /// Server port used when `host` carries none.
    #[serde(default = "default_ldaps_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default = "default_true")]
    pub use_ssl: bool,

    /// Skip server certificate verification.
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Bind DN for authentication.
    pub bind_dn: String,

    /// Bind password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub connection_timeout_secs: u64,
}

impl std::fmt::Debug for LdapConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .finish()
    }
}

fn default_ldaps_port() -> u16 {
    636
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

impl LdapConnection {
    /// Create connection parameters with LDAPS defaults.
    pub fn new(host: impl Into<String>, bind_dn: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_ldaps_port(),
            use_ssl: true,
            skip_tls_verify: false,
            bind_dn: bind_dn.into(),
            bind_password: None,
            connection_timeout_secs: default_timeout_secs(),
        }
    }

    /// Set bind password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Disable server certificate verification.
    #[must_use]
    pub fn with_skip_tls_verify(mut self, skip: bool) -> Self {
        self.skip_tls_verify = skip;
        self
    }

    /// Get the LDAP URL.
    ///
    /// Only the first host of a comma-separated list is used.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        let host = self.host.split(',').next().unwrap_or_default().trim();
        if host.contains(':') {
            format!("{scheme}://{host}")
        } else {
            format!("{scheme}://{host}:{}", self.port)
        }
    }

    /// Validate required fields.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration("host is required"));
        }
        if self.bind_dn.is_empty() {
            return Err(ConnectorError::invalid_configuration("bind_dn is required"));
        }
        Ok(())
    }
}

/// Configuration for the corporate directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorporateDirectoryConfig {
    /// Connection parameters.
    pub connection: LdapConnection,

    /// Search bases, tried in order (active users first, then deleted).
    pub search_bases: Vec<String>,

    /// Attributes requested on person searches.
    #[serde(default = "default_search_attributes")]
    pub search_attributes: Vec<String>,

    /// Attribute matched alongside `mail` in person filters.
    #[serde(default = "default_alias_attribute")]
    pub alias_attribute: String,

    /// Domain appended to manager uids.
    #[serde(default = "default_mail_domain")]
    pub mail_domain: String,

    /// Attribute holding the cost center.
    #[serde(default = "default_cost_center_attribute")]
    pub cost_center_attribute: String,

    /// Attribute holding the geo.
    #[serde(default = "default_geo_attribute")]
    pub geo_attribute: String,
}

fn default_search_attributes() -> Vec<String> {
    [
        "uid",
        "cn",
        "mail",
        "title",
        "manager",
        "rhatCostCenter",
        "rhatGeo",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_alias_attribute() -> String {
    "rhatPreferredAlias".to_string()
}

fn default_mail_domain() -> String {
    "redhat.com".to_string()
}

fn default_cost_center_attribute() -> String {
    "rhatCostCenter".to_string()
}

fn default_geo_attribute() -> String {
    "rhatGeo".to_string()
}

impl CorporateDirectoryConfig {
    /// Create a corporate directory config with the default attribute set.
    pub fn new(connection: LdapConnection, search_bases: Vec<String>) -> Self {
        Self {
            connection,
            search_bases,
            search_attributes: default_search_attributes(),
            alias_attribute: default_alias_attribute(),
            mail_domain: default_mail_domain(),
            cost_center_attribute: default_cost_center_attribute(),
            geo_attribute: default_geo_attribute(),
        }
    }

    /// Replace the requested attribute list (comma-separated input accepted).
    #[must_use]
    pub fn with_search_attributes(mut self, attributes: &str) -> Self {
        let parsed: Vec<String> = attributes
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(ToString::to_string)
            .collect();
        if !parsed.is_empty() {
            self.search_attributes = parsed;
        }
        self
    }

    /// Set the mail domain used for manager DN conversion.
    #[must_use]
    pub fn with_mail_domain(mut self, domain: impl Into<String>) -> Self {
        self.mail_domain = domain.into();
        self
    }

    /// Whether manager DNs are requested and should be converted.
    #[must_use]
    pub fn requests_manager(&self) -> bool {
        self.search_attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case("manager"))
    }

    /// Validate required fields.
    pub fn validate(&self) -> ConnectorResult<()> {
        self.connection.validate()?;
        if self.search_bases.iter().all(|b| b.trim().is_empty()) {
            return Err(ConnectorError::invalid_configuration(
                "at least one search base is required",
            ));
        }
        Ok(())
    }
}

/// Configuration for the IPA account directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDirectoryConfig {
    /// Connection parameters.
    pub connection: LdapConnection,

    /// User container DN (e.g. `cn=users,cn=accounts,dc=example,dc=com`).
    pub base_dn: String,

    /// Attributes requested on account searches.
    #[serde(default = "default_account_attributes")]
    pub search_attributes: Vec<String>,
}

fn default_account_attributes() -> Vec<String> {
    ["uid", "mail", "givenName", "sn", "title"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl AccountDirectoryConfig {
    /// Create an account directory config with the default attribute set.
    pub fn new(connection: LdapConnection, base_dn: impl Into<String>) -> Self {
        Self {
            connection,
            base_dn: base_dn.into(),
            search_attributes: default_account_attributes(),
        }
    }

    /// Group container DN, the sibling of the user container.
    #[must_use]
    pub fn groups_dn(&self) -> String {
        self.base_dn.replace("cn=users", "cn=groups")
    }

    /// Validate required fields.
    pub fn validate(&self) -> ConnectorResult<()> {
        self.connection.validate()?;
        if self.base_dn.is_empty() {
            return Err(ConnectorError::invalid_configuration("base_dn is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_uses_port_when_host_has_none() {
        let conn = LdapConnection::new("ldap.corp.example.com", "uid=svc,dc=example,dc=com");
        assert_eq!(conn.url(), "ldaps://ldap.corp.example.com:636");
    }

    #[test]
    fn test_url_keeps_explicit_port_and_first_host() {
        let mut conn = LdapConnection::new("ldap1:1636, ldap2:1636", "uid=svc");
        conn.use_ssl = false;
        assert_eq!(conn.url(), "ldap://ldap1:1636");
    }

    #[test]
    fn test_debug_redacts_password() {
        let conn = LdapConnection::new("ldap", "uid=svc").with_password("hunter2");
        let debug = format!("{conn:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_validation() {
        let conn = LdapConnection::new("ldap", "uid=svc");
        assert!(CorporateDirectoryConfig::new(conn.clone(), vec!["dc=corp".into()])
            .validate()
            .is_ok());
        assert!(CorporateDirectoryConfig::new(conn.clone(), vec![" ".into()])
            .validate()
            .is_err());
        assert!(LdapConnection::new("", "uid=svc").validate().is_err());
        assert!(AccountDirectoryConfig::new(conn, "").validate().is_err());
    }

    #[test]
    fn test_search_attributes_parsing() {
        let conn = LdapConnection::new("ldap", "uid=svc");
        let config = CorporateDirectoryConfig::new(conn, vec!["dc=corp".into()])
            .with_search_attributes("uid, mail ,title,,");
        assert_eq!(config.search_attributes, vec!["uid", "mail", "title"]);
        assert!(!config.requests_manager());
    }

    #[test]
    fn test_groups_dn() {
        let conn = LdapConnection::new("ipa", "uid=svc");
        let config = AccountDirectoryConfig::new(conn, "cn=users,cn=accounts,dc=opentlc,dc=com");
        assert_eq!(config.groups_dn(), "cn=groups,cn=accounts,dc=opentlc,dc=com");
    }
}
