//! Corporate directory lookups and the chargeback manager walk.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use reporting_connector::directory::{DirectoryEntry, DirectorySource};
use tracing::{debug, warn};

use crate::config::EnrichmentPolicy;
use crate::error::EngineResult;

/// A person and, when the directory names one, their manager.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub entry: DirectoryEntry,
    pub manager: Option<DirectoryEntry>,
}

impl UserProfile {
    /// Mail of the manager, from the manager entry or the person's DN link.
    pub fn manager_email(&self) -> Option<&str> {
        self.manager
            .as_ref()
            .and_then(|m| m.mail.as_deref())
            .or(self.entry.manager_email.as_deref())
    }
}

#[derive(Clone)]
pub struct DirectoryLookup {
    source: Arc<dyn DirectorySource>,
    policy: EnrichmentPolicy,
}

impl DirectoryLookup {
    pub fn new(source: Arc<dyn DirectorySource>, policy: EnrichmentPolicy) -> Self {
        Self { source, policy }
    }

    pub fn default_mailbox(&self) -> &str {
        &self.policy.default_mailbox
    }

    /// Walk up the management chain from `email` to the nearest manager in
    /// `chargeback_set` (keyed by lower-cased email).
    ///
    /// Reaching a sentinel, a person without a manager, a repeated node or
    /// the depth bound yields the default mailbox.
    pub async fn resolve_chargeback_manager(
        &self,
        email: &str,
        chargeback_set: &HashMap<String, i32>,
    ) -> EngineResult<String> {
        let mut subject = email.trim().to_lowercase();
        let mut visited = HashSet::from([subject.clone()]);

        for depth in 0..self.policy.max_chain_depth {
            let Some(entry) = self.source.find_person(&subject).await? else {
                debug!(subject = %subject, depth, "Person not in directory");
                return Ok(self.policy.default_mailbox.clone());
            };
            let Some(manager) = entry.manager_email.map(|m| m.trim().to_lowercase()) else {
                debug!(subject = %subject, depth, "Person has no manager");
                return Ok(self.policy.default_mailbox.clone());
            };

            if self.is_sentinel(&manager) {
                debug!(subject = %subject, manager = %manager, "Reached top of hierarchy");
                return Ok(self.policy.default_mailbox.clone());
            }
            if chargeback_set.contains_key(&manager) {
                debug!(person = email, manager = %manager, depth, "Chargeback manager found");
                return Ok(manager);
            }
            if !visited.insert(manager.clone()) {
                warn!(person = email, manager = %manager, "Management chain loops");
                return Ok(self.policy.default_mailbox.clone());
            }
            subject = manager;
        }

        warn!(
            person = email,
            max_depth = self.policy.max_chain_depth,
            "Management chain deeper than allowed"
        );
        Ok(self.policy.default_mailbox.clone())
    }

    /// Look up a person and their manager.
    ///
    /// When the mail address is unknown, retries with the conventional
    /// address built from the person's names.
    pub async fn resolve_user_profile(
        &self,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> EngineResult<Option<UserProfile>> {
        let mut entry = self.source.find_person(email).await?;

        if entry.is_none() {
            if let Some(guess) = self.heuristic_email(first_name, last_name) {
                debug!(email, guess = %guess, "Retrying directory lookup with derived address");
                entry = self.source.find_person(&guess).await?;
            }
        }

        let Some(entry) = entry else {
            return Ok(None);
        };

        let manager = match entry.manager_email.as_deref() {
            Some(manager_email) => self.source.find_person(manager_email).await?,
            None => None,
        };

        Ok(Some(UserProfile { entry, manager }))
    }

    /// `first_initial + first8(last_name) @ corporate domain`, lower-cased.
    pub fn heuristic_email(&self, first_name: Option<&str>, last_name: Option<&str>) -> Option<String> {
        let initial = first_name?.trim().chars().next()?;
        let last: String = last_name?.trim().chars().take(8).collect();
        if last.is_empty() {
            return None;
        }
        Some(format!("{initial}{last}@{}", self.policy.corporate_domain).to_lowercase())
    }

    fn is_sentinel(&self, email: &str) -> bool {
        self.policy
            .sentinels
            .iter()
            .any(|s| s.eq_ignore_ascii_case(email))
    }
}
