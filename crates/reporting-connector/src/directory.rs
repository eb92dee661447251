//! Directory records and lookup capabilities.
//!
//! Two directories feed user enrichment:
//!
//! - the corporate directory, searched by email, which knows cost centers,
//!   geos, titles and the reporting hierarchy;
//! - the account directory (IPA), searched by username, which knows who
//!   requested a resource and which region/partner groups they belong to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConnectorResult;

/// A person found in the corporate directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Login identifier (`uid`).
    pub uid: Option<String>,
    /// Primary mail address.
    pub mail: Option<String>,
    /// Common name.
    pub cn: Option<String>,
    /// Job title.
    pub title: Option<String>,
    /// Cost center attribute.
    pub cost_center: Option<String>,
    /// Geo attribute.
    pub geo: Option<String>,
    /// Direct manager's email, derived from the manager DN.
    pub manager_email: Option<String>,
    /// Every requested attribute, first value only.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A requester account found in the account directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Login identifier.
    pub uid: String,
    /// Mail address.
    pub mail: String,
    /// Given name.
    pub given_name: Option<String>,
    /// Surname.
    pub surname: Option<String>,
    /// Job title, `other` when the directory has none.
    pub title: String,
    /// Region derived from the `*-geo-<region>` group membership.
    pub region: String,
    /// Partner tag derived from the `*partner*` group membership.
    pub partner: String,
}

/// Capability for searching the corporate directory.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Find a person by mail address or mail alias.
    ///
    /// Returns `Ok(None)` when no search base holds a matching entry.
    async fn find_person(&self, email: &str) -> ConnectorResult<Option<DirectoryEntry>>;
}

/// Capability for searching the requester account directory.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Find an account by username.
    async fn find_account(&self, username: &str) -> ConnectorResult<Option<AccountEntry>>;
}

/// Convert a manager distinguished name into a mail address.
///
/// `uid=jdoe,ou=users,dc=corp,dc=com` with domain `corp.com` becomes
/// `jdoe@corp.com`. Returns `None` when the first RDN is not a `uid`.
pub fn dn_to_email(dn: &str, mail_domain: &str) -> Option<String> {
    let first_rdn = dn.split(',').next()?.trim();
    let (attr, value) = first_rdn.split_once('=')?;
    if !attr.trim().eq_ignore_ascii_case("uid") {
        return None;
    }
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(format!("{value}@{mail_domain}"))
}
