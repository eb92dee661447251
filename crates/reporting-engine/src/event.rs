//! Typed watch events.
//!
//! The transport delivers Kubernetes-style watch events. Only the fields the
//! reconciler reads are modelled; everything else is ignored on decode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of AnarchySubject objects.
pub const SUBJECT_KIND: &str = "AnarchySubject";

/// What happened to the watched object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// Object metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// A non-blank annotation value.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        non_blank(self.annotations.get(key).map(String::as_str))
    }

    /// A non-blank label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        non_blank(self.labels.get(key).map(String::as_str))
    }
}

/// Any watched object, decoded just far enough to route it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeObject {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
}

/// A raw watch event as read from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub change: ChangeType,
    pub object: Value,
}

impl WatchEvent {
    /// The `kind` of the carried object, if any.
    pub fn kind(&self) -> Option<&str> {
        self.object.get("kind").and_then(Value::as_str)
    }

    /// Decode the carried object as routing metadata.
    pub fn object_meta(&self) -> serde_json::Result<KubeObject> {
        serde_json::from_value(self.object.clone())
    }

    /// Decode the carried object as an AnarchySubject event.
    pub fn into_resource_event(self) -> serde_json::Result<ResourceEvent> {
        Ok(ResourceEvent {
            change: self.change,
            subject: serde_json::from_value(self.object)?,
        })
    }
}

/// An event about one AnarchySubject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub change: ChangeType,
    pub subject: AnarchySubject,
}

impl ResourceEvent {
    #[must_use]
    pub fn new(change: ChangeType, subject: AnarchySubject) -> Self {
        Self { change, subject }
    }

    /// True when the transport reported the subject gone or going.
    pub fn is_deletion(&self) -> bool {
        self.change == ChangeType::Deleted || self.subject.metadata.deletion_timestamp.is_some()
    }
}

/// The resource whose lifecycle is tracked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnarchySubject {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SubjectSpec,
    #[serde(default)]
    pub status: SubjectStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governor: Option<String>,
    #[serde(default)]
    pub vars: SubjectVars,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectVars {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_state: Option<String>,
    #[serde(default)]
    pub job_vars: Map<String, Value>,
    #[serde(default)]
    pub provision_data: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectStatus {
    #[serde(rename = "towerJobs", default)]
    pub tower_jobs: TowerJobs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TowerJobs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision: Option<TowerJob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destroy: Option<TowerJob>,
}

/// Reference to an automation job run for the subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowerJob {
    /// Job id; numeric or string depending on the deployer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer_job: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_timestamp: Option<DateTime<Utc>>,
}

impl AnarchySubject {
    pub fn current_state(&self) -> Option<&str> {
        non_blank(self.spec.vars.current_state.as_deref())
    }

    pub fn governor(&self) -> Option<&str> {
        non_blank(self.spec.governor.as_deref())
    }

    /// A job var rendered as a string. Numbers and booleans are stringified.
    pub fn job_var(&self, key: &str) -> Option<String> {
        self.spec.vars.job_vars.get(key).and_then(scalar_to_string)
    }

    /// A job var read as an integer, accepting numeric strings.
    pub fn job_var_i32(&self, key: &str) -> Option<i32> {
        match self.spec.vars.job_vars.get(key)? {
            Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn provision_data(&self, key: &str) -> Option<String> {
        self.spec.vars.provision_data.get(key).and_then(scalar_to_string)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotation(key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.label(key)
    }

    pub fn provision_job(&self) -> Option<&TowerJob> {
        self.status.tower_jobs.provision.as_ref()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(Some(s)).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Lifecycle phase of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceState {
    New,
    ProvisionPending,
    Provisioning,
    ProvisionFailed,
    ProvisionComplete,
    Started,
    StartPending,
    Starting,
    StartFailed,
    StopPending,
    Stopping,
    StopFailed,
    Stopped,
    Destroying,
    DestroyFailed,
    /// Written to the lifecycle log when the subject disappears while
    /// destroying. Never reported by the transport.
    DestroyCompleted,
}

impl ResourceState {
    /// Every state the transport may report.
    pub const REPORTED: [ResourceState; 15] = [
        ResourceState::New,
        ResourceState::ProvisionPending,
        ResourceState::Provisioning,
        ResourceState::ProvisionFailed,
        ResourceState::ProvisionComplete,
        ResourceState::Started,
        ResourceState::StartPending,
        ResourceState::Starting,
        ResourceState::StartFailed,
        ResourceState::StopPending,
        ResourceState::Stopping,
        ResourceState::StopFailed,
        ResourceState::Stopped,
        ResourceState::Destroying,
        ResourceState::DestroyFailed,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::New => "new",
            ResourceState::ProvisionPending => "provision-pending",
            ResourceState::Provisioning => "provisioning",
            ResourceState::ProvisionFailed => "provision-failed",
            ResourceState::ProvisionComplete => "provision-complete",
            ResourceState::Started => "started",
            ResourceState::StartPending => "start-pending",
            ResourceState::Starting => "starting",
            ResourceState::StartFailed => "start-failed",
            ResourceState::StopPending => "stop-pending",
            ResourceState::Stopping => "stopping",
            ResourceState::StopFailed => "stop-failed",
            ResourceState::Stopped => "stopped",
            ResourceState::Destroying => "destroying",
            ResourceState::DestroyFailed => "destroy-failed",
            ResourceState::DestroyCompleted => "destroy-completed",
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.as_str().ends_with("-failed")
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceState::REPORTED
            .iter()
            .chain(std::iter::once(&ResourceState::DestroyCompleted))
            .find(|state| state.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown resource state: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "type": "MODIFIED",
            "object": {
                "apiVersion": "anarchy.gpte.redhat.com/v1",
                "kind": "AnarchySubject",
                "metadata": {
                    "name": "gpte.dev.env1-abc",
                    "namespace": "anarchy-operator",
                    "uid": "0b0c",
                    "annotations": {
                        "poolboy.gpte.redhat.com/resource-claim-namespace": "user-alice"
                    }
                },
                "spec": {
                    "governor": "gpte.dev.env1",
                    "vars": {
                        "current_state": "provisioning",
                        "desired_state": "started",
                        "job_vars": {"uuid": "abc-123", "num_users": "5", "guid": 42}
                    }
                },
                "status": {
                    "towerJobs": {
                        "provision": {
                            "deployerJob": 1234,
                            "startTimestamp": "2024-03-01T10:00:00Z"
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_decode_subject_event() {
        let raw: WatchEvent = serde_json::from_value(sample()).unwrap();
        assert_eq!(raw.kind(), Some(SUBJECT_KIND));

        let event = raw.into_resource_event().unwrap();
        assert_eq!(event.change, ChangeType::Modified);
        assert!(!event.is_deletion());

        let subject = &event.subject;
        assert_eq!(subject.current_state(), Some("provisioning"));
        assert_eq!(subject.spec.vars.desired_state.as_deref(), Some("started"));
        assert_eq!(subject.governor(), Some("gpte.dev.env1"));
        assert_eq!(subject.job_var("uuid").as_deref(), Some("abc-123"));
        assert_eq!(subject.job_var("guid").as_deref(), Some("42"));
        assert_eq!(subject.job_var_i32("num_users"), Some(5));
        assert_eq!(
            subject.annotation("poolboy.gpte.redhat.com/resource-claim-namespace"),
            Some("user-alice")
        );

        let job = subject.provision_job().unwrap();
        assert!(job.start_timestamp.is_some());
        assert!(subject.status.tower_jobs.destroy.is_none());
    }

    #[test]
    fn test_blank_values_are_absent() {
        let mut subject = AnarchySubject::default();
        subject.spec.vars.current_state = Some("  ".into());
        subject
            .spec
            .vars
            .job_vars
            .insert("salesforce_id".into(), Value::String(String::new()));
        assert_eq!(subject.current_state(), None);
        assert_eq!(subject.job_var("salesforce_id"), None);
    }

    #[test]
    fn test_deletion_timestamp_counts_as_deletion() {
        let mut subject = AnarchySubject::default();
        subject.metadata.deletion_timestamp = Some(Utc::now());
        assert!(ResourceEvent::new(ChangeType::Modified, subject).is_deletion());
    }

    #[test]
    fn test_state_round_trip_and_failure() {
        for state in ResourceState::REPORTED {
            assert_eq!(state.as_str().parse::<ResourceState>(), Ok(state));
        }
        assert!(ResourceState::ProvisionFailed.is_failure());
        assert!(ResourceState::DestroyFailed.is_failure());
        assert!(!ResourceState::Destroying.is_failure());
        assert!("exploded".parse::<ResourceState>().is_err());
    }
}
