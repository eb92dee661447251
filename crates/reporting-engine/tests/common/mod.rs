//! Shared fixtures for engine tests: mock directory, account and CRM
//! sources, and subject event builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reporting_connector::crm::{CrmSource, OpportunityRecord};
use reporting_connector::directory::{AccountEntry, AccountSource, DirectoryEntry, DirectorySource};
use reporting_connector::error::{ConnectorError, ConnectorResult};
use reporting_engine::{
    Dispatcher, EngineConfig, InMemoryLedgerStore, WatchCache, WatchEvent,
};
use serde_json::{json, Value};

pub const POOLBOY: &str = "poolboy.gpte.redhat.com";

// =============================================================================
// Mock sources
// =============================================================================

#[derive(Default)]
pub struct MockAccounts {
    pub accounts: HashMap<String, AccountEntry>,
    pub fail: bool,
}

impl MockAccounts {
    pub fn with(mut self, uid: &str, mail: &str, given: &str, surname: &str) -> Self {
        self.accounts.insert(
            uid.to_string(),
            AccountEntry {
                uid: uid.to_string(),
                mail: mail.to_string(),
                given_name: Some(given.to_string()),
                surname: Some(surname.to_string()),
                title: "other".to_string(),
                region: "NA".to_string(),
                partner: "partner".to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl AccountSource for MockAccounts {
    async fn find_account(&self, username: &str) -> ConnectorResult<Option<AccountEntry>> {
        if self.fail {
            return Err(ConnectorError::ConnectionTimeout { timeout_secs: 10 });
        }
        Ok(self.accounts.get(username).cloned())
    }
}

#[derive(Default)]
pub struct MockDirectory {
    people: Vec<DirectoryEntry>,
    pub lookups: AtomicUsize,
}

impl MockDirectory {
    pub fn with(mut self, mail: &str, uid: &str, cn: &str, manager: Option<&str>) -> Self {
        self.people.push(DirectoryEntry {
            dn: format!("uid={uid},ou=users,dc=redhat,dc=com"),
            uid: Some(uid.to_string()),
            mail: Some(mail.to_string()),
            cn: Some(cn.to_string()),
            title: Some("Engineer".to_string()),
            cost_center: Some("420".to_string()),
            geo: Some("NA".to_string()),
            manager_email: manager.map(str::to_string),
            ..Default::default()
        });
        self
    }
}

#[async_trait]
impl DirectorySource for MockDirectory {
    async fn find_person(&self, email: &str) -> ConnectorResult<Option<DirectoryEntry>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .people
            .iter()
            .find(|p| p.mail.as_deref() == Some(email))
            .cloned())
    }
}

#[derive(Default)]
pub struct MockCrm {
    pub by_number: HashMap<String, OpportunityRecord>,
}

#[async_trait]
impl CrmSource for MockCrm {
    async fn opportunity_by_number(
        &self,
        number: &str,
    ) -> ConnectorResult<Option<OpportunityRecord>> {
        Ok(self.by_number.get(number).cloned())
    }

    async fn opportunity_by_id(&self, _id: &str) -> ConnectorResult<Option<OpportunityRecord>> {
        Ok(None)
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub dispatcher: Dispatcher,
    pub store: Arc<InMemoryLedgerStore>,
    pub cache: Arc<WatchCache>,
}

impl Harness {
    pub fn new(accounts: MockAccounts, directory: MockDirectory, crm: Option<MockCrm>) -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let cache = Arc::new(WatchCache::new());
        let crm: Option<Arc<dyn CrmSource>> = match crm {
            Some(crm) => Some(Arc::new(crm)),
            None => None,
        };
        let dispatcher = Dispatcher::new(
            EngineConfig::default(),
            store.clone(),
            cache.clone(),
            Arc::new(accounts),
            Arc::new(directory),
            crm,
        );
        Self {
            dispatcher,
            store,
            cache,
        }
    }

    /// Alice at the corporate domain, reporting to Bob, who reports to Carol.
    pub fn alice() -> Self {
        Self::new(
            MockAccounts::default().with("alice", "alice@redhat.com", "alice", "smith"),
            MockDirectory::default()
                .with("alice@redhat.com", "asmith", "Alice Smith", Some("bob@redhat.com"))
                .with("bob@redhat.com", "bjones", "Bob Jones", Some("carol@redhat.com"))
                .with("carol@redhat.com", "cdoe", "Carol Doe", None),
            None,
        )
    }
}

// =============================================================================
// Event builders
// =============================================================================

/// A subject event requested directly by `username`.
pub fn subject_event(change: &str, state: &str, uuid: &str, username: &str) -> WatchEvent {
    subject_event_with(change, state, uuid, json!({
        format!("{POOLBOY}/resource-requester-preferred-username"): username
    }), json!({}))
}

pub fn subject_event_with(
    change: &str,
    state: &str,
    uuid: &str,
    annotations: Value,
    extra_job_vars: Value,
) -> WatchEvent {
    let mut job_vars = json!({
        "uuid": uuid,
        "cloud_provider": "ec2",
        "aws_region": "us-east-1",
        "num_users": 1
    });
    if let (Some(target), Value::Object(extra)) = (job_vars.as_object_mut(), extra_job_vars) {
        target.extend(extra);
    }
    serde_json::from_value(json!({
        "type": change,
        "object": {
            "apiVersion": "anarchy.gpte.redhat.com/v1",
            "kind": "AnarchySubject",
            "metadata": {
                "name": format!("gpte.dev.env1-{uuid}"),
                "namespace": "anarchy-operator",
                "annotations": annotations
            },
            "spec": {
                "governor": "gpte.dev.env1",
                "vars": {
                    "current_state": state,
                    "job_vars": job_vars
                }
            }
        }
    }))
    .expect("valid watch event")
}

pub fn namespace_event(name: &str, requester: &str) -> WatchEvent {
    serde_json::from_value(json!({
        "type": "ADDED",
        "object": {
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {
                "name": name,
                "annotations": {"openshift.io/requester": requester}
            }
        }
    }))
    .expect("valid watch event")
}
