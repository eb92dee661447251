//! IPA account directory lookups.
//!
//! Requesters log in with an IPA account. Region and partner affiliation are
//! not attributes of the account; they are encoded in the names of groups the
//! account belongs to (`rhpds-geo-na`, `rhpds-partner-acme`).

use async_trait::async_trait;
use tracing::instrument;

use reporting_connector::directory::{AccountEntry, AccountSource};
use reporting_connector::error::ConnectorResult;

use crate::config::AccountDirectoryConfig;
use crate::directory::first_value;
use crate::filter::{account_filter, membership_filter};
use crate::session::LdapSession;

const DEFAULT_TITLE: &str = "other";
const DEFAULT_REGION: &str = "unknown";
const DEFAULT_PARTNER: &str = "partner";

/// Third dash-separated token of a group name, upper-cased.
pub fn group_suffix(group_cn: &str) -> Option<String> {
    group_cn
        .split('-')
        .nth(2)
        .filter(|token| !token.is_empty())
        .map(str::to_uppercase)
}

/// IPA directory holding requester accounts.
pub struct AccountDirectory {
    config: AccountDirectoryConfig,
    session: LdapSession,
}

impl AccountDirectory {
    /// Create a directory client; the connection is opened on first search.
    pub fn new(config: AccountDirectoryConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let session = LdapSession::new(config.connection.clone())?;
        Ok(Self { config, session })
    }

    async fn group_tag(&self, fragment: &str, username: &str) -> ConnectorResult<Option<String>> {
        let groups = self
            .session
            .search(
                &self.config.groups_dn(),
                &membership_filter(fragment, username),
                &["cn".to_string()],
            )
            .await?;
        Ok(groups
            .first()
            .and_then(|g| first_value(g, "cn"))
            .and_then(|cn| group_suffix(&cn)))
    }
}

#[async_trait]
impl AccountSource for AccountDirectory {
    #[instrument(skip(self))]
    async fn find_account(&self, username: &str) -> ConnectorResult<Option<AccountEntry>> {
        let entries = self
            .session
            .search(
                &self.config.base_dn,
                &account_filter(username),
                &self.config.search_attributes,
            )
            .await?;

        let Some(entry) = entries.first() else {
            return Ok(None);
        };
        let Some(mail) = first_value(entry, "mail").map(|mail| mail.to_lowercase()) else {
            return Ok(None);
        };

        let region = self
            .group_tag("geo", username)
            .await?
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let partner = self
            .group_tag("partner", username)
            .await?
            .unwrap_or_else(|| DEFAULT_PARTNER.to_string());

        Ok(Some(AccountEntry {
            uid: first_value(entry, "uid").unwrap_or_else(|| username.to_string()),
            mail,
            given_name: first_value(entry, "givenName"),
            surname: first_value(entry, "sn"),
            title: first_value(entry, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            region,
            partner,
        }))
    }
}
