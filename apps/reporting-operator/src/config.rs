//! Operator configuration loaded from environment variables.
//!
//! Loading is fail-fast: a missing directory or database setting aborts
//! startup with the name of the variable.

use std::env;
use std::time::Duration;

use reporting_connector_crm::{CrmAuth, CrmConfig};
use reporting_connector_ldap::{AccountDirectoryConfig, CorporateDirectoryConfig, LdapConnection};
use reporting_engine::{ApiDomains, EngineConfig};
use thiserror::Error;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Connection settings for one LDAP directory.
#[derive(Clone)]
pub struct LdapSettings {
    pub hosts: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub base_dn: String,
}

impl std::fmt::Debug for LdapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSettings")
            .field("hosts", &self.hosts)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"***REDACTED***")
            .field("base_dn", &self.base_dn)
            .finish()
    }
}

impl LdapSettings {
    fn connection(&self) -> LdapConnection {
        LdapConnection::new(&self.hosts, &self.bind_dn).with_password(&self.bind_password)
    }
}

/// Salesforce JWT-bearer settings.
#[derive(Clone)]
pub struct SalesforceSettings {
    pub host: String,
    pub login_url: Option<String>,
    pub consumer_key: String,
    pub username: String,
    pub private_key: String,
}

impl std::fmt::Debug for SalesforceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceSettings")
            .field("host", &self.host)
            .field("login_url", &self.login_url)
            .field("consumer_key", &self.consumer_key)
            .field("username", &self.username)
            .field("private_key", &"***REDACTED***")
            .finish()
    }
}

/// Operator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub domains: ApiDomains,
    /// Corporate directory.
    pub ldap: LdapSettings,
    /// Search base for departed employees, searched after the main base.
    pub ldap_base_dn_deleted: Option<String>,
    pub ldap_search_attributes: Option<String>,
    /// Requester account directory.
    pub ipa: LdapSettings,
    /// CRM; opportunity lookups are disabled when absent.
    pub salesforce: Option<SalesforceSettings>,
    pub rust_log: String,
    pub max_concurrent_events: usize,
    /// Wait before redelivering a deferred event.
    pub defer_delay: Duration,
    /// Deliveries of one event before a deferral is given up.
    pub max_defer_attempts: u32,
}

pub const DEFAULT_MAX_CONCURRENT_EVENTS: usize = 16;
pub const DEFAULT_DEFER_DELAY_SECS: u64 = 5;
pub const DEFAULT_MAX_DEFER_ATTEMPTS: u32 = 12;

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL`
    /// - `LDAP_HOSTS`, `LDAP_BIND_DN`, `LDAP_BIND_PASSWORD`, `LDAP_BASE_DN`
    /// - `IPA_HOSTS`, `IPA_BIND_DN`, `IPA_BIND_PASSWORD`, `IPA_BASE_DN`
    ///
    /// # Optional Variables
    ///
    /// - `ANARCHY_DOMAIN`, `BABYLON_DOMAIN`, `POOLBOY_DOMAIN` and their
    ///   `*_API_VERSION` companions
    /// - `LDAP_BASE_DN_DELETED`, `LDAP_SEARCH_ATTRIBUTES`
    /// - `SF_HOST`; when set, `SF_CONSUMER_KEY`, `SF_USERNAME` and
    ///   `SF_PRIVATE_KEY` become required and `SF_LOGIN_URL` is honored
    /// - `RUST_LOG` (default: "info")
    /// - `MAX_CONCURRENT_EVENTS` (default: 16)
    /// - `DEFER_DELAY_SECS` (default: 5), `MAX_DEFER_ATTEMPTS` (default: 12)
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let defaults = ApiDomains::default();
        let domains = ApiDomains {
            anarchy_domain: vars.or("ANARCHY_DOMAIN", defaults.anarchy_domain),
            anarchy_api_version: vars.or("ANARCHY_API_VERSION", defaults.anarchy_api_version),
            babylon_domain: vars.or("BABYLON_DOMAIN", defaults.babylon_domain),
            babylon_api_version: vars.or("BABYLON_API_VERSION", defaults.babylon_api_version),
            poolboy_domain: vars.or("POOLBOY_DOMAIN", defaults.poolboy_domain),
            poolboy_api_version: vars.or("POOLBOY_API_VERSION", defaults.poolboy_api_version),
        };

        let salesforce = match vars.optional("SF_HOST") {
            Some(host) => Some(SalesforceSettings {
                host,
                login_url: vars.optional("SF_LOGIN_URL"),
                consumer_key: vars.required("SF_CONSUMER_KEY")?,
                username: vars.required("SF_USERNAME")?,
                private_key: vars.required("SF_PRIVATE_KEY")?,
            }),
            None => None,
        };

        let max_concurrent_events: usize = vars.parse_or("MAX_CONCURRENT_EVENTS", DEFAULT_MAX_CONCURRENT_EVENTS)?;
        if max_concurrent_events == 0 {
            return Err(ConfigError::InvalidValue {
                var: "MAX_CONCURRENT_EVENTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url: vars.required("DATABASE_URL")?,
            domains,
            ldap: LdapSettings {
                hosts: vars.required("LDAP_HOSTS")?,
                bind_dn: vars.required("LDAP_BIND_DN")?,
                bind_password: vars.required("LDAP_BIND_PASSWORD")?,
                base_dn: vars.required("LDAP_BASE_DN")?,
            },
            ldap_base_dn_deleted: vars.optional("LDAP_BASE_DN_DELETED"),
            ldap_search_attributes: vars.optional("LDAP_SEARCH_ATTRIBUTES"),
            ipa: LdapSettings {
                hosts: vars.required("IPA_HOSTS")?,
                bind_dn: vars.required("IPA_BIND_DN")?,
                bind_password: vars.required("IPA_BIND_PASSWORD")?,
                base_dn: vars.required("IPA_BASE_DN")?,
            },
            salesforce,
            rust_log: vars.or("RUST_LOG", "info".to_string()),
            max_concurrent_events,
            defer_delay: Duration::from_secs(vars.parse_or("DEFER_DELAY_SECS", DEFAULT_DEFER_DELAY_SECS)?),
            max_defer_attempts: vars.parse_or("MAX_DEFER_ATTEMPTS", DEFAULT_MAX_DEFER_ATTEMPTS)?,
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            domains: self.domains.clone(),
            ..Default::default()
        }
    }

    pub fn corporate_directory(&self) -> CorporateDirectoryConfig {
        let mut bases = vec![self.ldap.base_dn.clone()];
        bases.extend(self.ldap_base_dn_deleted.clone());
        let config = CorporateDirectoryConfig::new(self.ldap.connection(), bases);
        match &self.ldap_search_attributes {
            Some(attributes) => config.with_search_attributes(attributes),
            None => config,
        }
    }

    pub fn account_directory(&self) -> AccountDirectoryConfig {
        AccountDirectoryConfig::new(self.ipa.connection(), &self.ipa.base_dn)
    }

    pub fn crm(&self) -> Option<CrmConfig> {
        let sf = self.salesforce.as_ref()?;
        let auth = CrmAuth::JwtBearer {
            consumer_key: sf.consumer_key.clone(),
            username: sf.username.clone(),
            private_key_pem: sf.private_key.clone(),
        };
        let config = CrmConfig::new(CrmConfig::normalize_url(&sf.host), auth);
        Some(match &sf.login_url {
            Some(url) => config.with_login_url(CrmConfig::normalize_url(url)),
            None => config,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
    }

    fn or(&self, name: &str, default: String) -> String {
        self.optional(name).unwrap_or(default)
    }

    fn parse_or<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                var: name.to_string(),
                message: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}
