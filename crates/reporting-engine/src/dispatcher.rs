//! Reconciliation dispatcher.
//!
//! Routes each subject event to the handler for its `current_state`. Every
//! tracked state first makes sure the provision is recorded, then logs the
//! state. Failure states attribute the failure to the provision when it
//! happened during provisioning. Deletion while destroying retires the
//! provision.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use reporting_connector::crm::CrmSource;
use reporting_connector::directory::{AccountSource, DirectorySource};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{WatchCache, NAMESPACE_KIND, RESOURCE_CLAIM_KIND};
use crate::config::EngineConfig;
use crate::directory::DirectoryLookup;
use crate::error::{EngineError, EngineResult};
use crate::event::{ResourceEvent, ResourceState, WatchEvent, SUBJECT_KIND};
use crate::facts::FactExtractor;
use crate::lifecycle::LifecycleLog;
use crate::opportunities::OpportunityResolver;
use crate::provision::ProvisionWriter;
use crate::store::LedgerStore;
use crate::users::UserEnricher;

/// How an event was disposed of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran to completion.
    Applied,
    /// Nothing to do, or nothing that can be done.
    Skipped(String),
    /// Redeliver later.
    Deferred(String),
    /// The handler failed; the event is considered handled.
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchOutcome::Deferred(_))
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Applied => f.write_str("applied"),
            DispatchOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            DispatchOutcome::Deferred(reason) => write!(f, "deferred: {reason}"),
            DispatchOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// What a state's handler does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateHandler {
    Ignore,
    Record,
    RecordFailure,
}

/// Handler per reported state name.
pub fn state_table() -> HashMap<&'static str, StateHandler> {
    ResourceState::REPORTED
        .iter()
        .map(|state| {
            let handler = if *state == ResourceState::New {
                StateHandler::Ignore
            } else if state.is_failure() {
                StateHandler::RecordFailure
            } else {
                StateHandler::Record
            };
            (state.as_str(), handler)
        })
        .collect()
}

pub struct Dispatcher {
    store: Arc<dyn LedgerStore>,
    cache: Arc<WatchCache>,
    facts: FactExtractor,
    writer: ProvisionWriter,
    log: LifecycleLog,
    states: HashMap<&'static str, StateHandler>,
}

impl Dispatcher {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn LedgerStore>,
        cache: Arc<WatchCache>,
        accounts: Arc<dyn AccountSource>,
        directory: Arc<dyn DirectorySource>,
        crm: Option<Arc<dyn CrmSource>>,
    ) -> Self {
        let lookup = DirectoryLookup::new(directory, config.enrichment.clone());
        let users = UserEnricher::new(lookup, config.enrichment);
        let opportunities = OpportunityResolver::new(crm, store.clone());
        Self {
            writer: ProvisionWriter::new(store.clone(), accounts, users, opportunities),
            log: LifecycleLog::new(store.clone()),
            facts: FactExtractor::new(config.domains),
            store,
            cache,
            states: state_table(),
        }
    }

    pub fn cache(&self) -> &Arc<WatchCache> {
        &self.cache
    }

    /// Route a raw watch event: namespaces and claims go to the cache,
    /// everything else is dispatched as a subject.
    pub async fn handle_watch_event(&self, event: WatchEvent) -> DispatchOutcome {
        let cached = matches!(event.kind(), Some(NAMESPACE_KIND | RESOURCE_CLAIM_KIND));
        if cached {
            return match event.object_meta() {
                Ok(object) => {
                    self.cache.observe(event.change, object).await;
                    DispatchOutcome::Applied
                }
                Err(e) => {
                    warn!(error = %e, "Malformed watched object");
                    DispatchOutcome::Skipped(format!("malformed object: {e}"))
                }
            };
        }

        match event.into_resource_event() {
            Ok(event) => self.dispatch(&event).await,
            Err(e) => {
                warn!(error = %e, "Malformed subject");
                DispatchOutcome::Skipped(format!("malformed subject: {e}"))
            }
        }
    }

    /// Handle one subject event. Never fails; errors become outcomes.
    #[instrument(
        skip(self, event),
        fields(subject = %event.subject.metadata.name, change = ?event.change)
    )]
    pub async fn dispatch(&self, event: &ResourceEvent) -> DispatchOutcome {
        match self.handle(event).await {
            Ok(outcome) => outcome,
            Err(EngineError::Deferred(reason)) => {
                debug!(reason = %reason, "Event deferred");
                DispatchOutcome::Deferred(reason)
            }
            Err(EngineError::InvalidEvent(reason)) => {
                warn!(reason = %reason, "Event skipped");
                DispatchOutcome::Skipped(reason)
            }
            Err(e) => {
                error!(error = %e, "Event handling failed");
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }

    async fn handle(&self, event: &ResourceEvent) -> EngineResult<DispatchOutcome> {
        let subject = &event.subject;
        if subject.kind != SUBJECT_KIND {
            warn!(kind = %subject.kind, "Not an AnarchySubject");
            return Ok(DispatchOutcome::Skipped(format!(
                "unexpected kind {}",
                subject.kind
            )));
        }

        if let Some(namespace) = self.facts.claim_namespace(subject) {
            if !event.is_deletion() && !self.cache.has_namespace(namespace).await {
                return Err(EngineError::Deferred(format!(
                    "namespace {namespace} not observed yet"
                )));
            }
        }

        let Some(state) = subject.current_state() else {
            return Ok(DispatchOutcome::Skipped("no current_state".to_string()));
        };
        let Some(handler) = self.states.get(state).copied() else {
            warn!(state, "Unrecognized state");
            return Ok(DispatchOutcome::Skipped(format!("unrecognized state {state}")));
        };
        if handler == StateHandler::Ignore {
            return Ok(DispatchOutcome::Skipped(format!("nothing to record for {state}")));
        }

        if event.is_deletion() {
            if state == ResourceState::Destroying.as_str() {
                return self.retire(event).await;
            }
            debug!(state, "Deleted outside destroying");
            return Ok(DispatchOutcome::Skipped(format!("deleted while {state}")));
        }

        self.record(event, state, handler).await
    }

    async fn record(
        &self,
        event: &ResourceEvent,
        state: &str,
        handler: StateHandler,
    ) -> EngineResult<DispatchOutcome> {
        let facts = self.facts.extract(&event.subject, &self.cache).await?;
        self.writer.ensure(&facts).await?;

        if handler == StateHandler::RecordFailure {
            let latest = self.log.latest(&facts.uuid).await?;
            if latest.as_deref().is_some_and(|op| op.starts_with("provision")) {
                self.store.mark_provision_failed(&facts.uuid).await?;
                info!(uuid = %facts.uuid, state, "Provision attributed as failed");
            }
        }

        self.log
            .append(&facts.uuid, state, facts.username.as_deref())
            .await?;
        Ok(DispatchOutcome::Applied)
    }

    async fn retire(&self, event: &ResourceEvent) -> EngineResult<DispatchOutcome> {
        let subject = &event.subject;
        let uuid = self
            .facts
            .resource_uuid(subject)
            .ok_or_else(|| EngineError::invalid("subject has no resource uuid"))?;
        let executor = self.facts.username(subject, &self.cache).await;

        if self.store.retire_provision(&uuid, Utc::now()).await? {
            info!(uuid = %uuid, "Provision retired");
        } else if !self.store.provision_exists(&uuid).await? {
            warn!(uuid = %uuid, "Retiring a resource with no provision recorded");
        }

        self.log
            .append(
                &uuid,
                ResourceState::DestroyCompleted.as_str(),
                executor.as_deref(),
            )
            .await?;
        Ok(DispatchOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_table_covers_reported_states() {
        let table = state_table();
        assert_eq!(table.len(), 15);
        assert_eq!(table["new"], StateHandler::Ignore);
        assert_eq!(table["provisioning"], StateHandler::Record);
        assert_eq!(table["destroying"], StateHandler::Record);
        assert_eq!(table["stop-failed"], StateHandler::RecordFailure);
        assert!(!table.contains_key("destroy-completed"));
    }

    #[test]
    fn test_only_deferred_is_retryable() {
        assert!(DispatchOutcome::Deferred("x".into()).is_retryable());
        assert!(!DispatchOutcome::Failed("x".into()).is_retryable());
        assert_eq!(DispatchOutcome::Skipped("why".into()).to_string(), "skipped: why");
    }
}
