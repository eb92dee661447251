//! Cache of observed namespaces and resource claims.
//!
//! Subjects reference both by name; the dispatcher reads them here instead
//! of querying the cluster. Entries are never evicted.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::event::{ChangeType, KubeObject};

/// Annotation on a namespace naming the user who requested it.
pub const REQUESTER_ANNOTATION: &str = "openshift.io/requester";

pub const NAMESPACE_KIND: &str = "Namespace";
pub const RESOURCE_CLAIM_KIND: &str = "ResourceClaim";

#[derive(Debug, Default)]
pub struct WatchCache {
    namespaces: RwLock<HashMap<String, KubeObject>>,
    claims: RwLock<HashMap<(String, String), KubeObject>>,
}

impl WatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a namespace or claim event. Returns false for other kinds.
    pub async fn observe(&self, change: ChangeType, object: KubeObject) -> bool {
        match object.kind.as_str() {
            NAMESPACE_KIND => {
                self.observe_namespace(object).await;
                true
            }
            RESOURCE_CLAIM_KIND => {
                self.observe_claim(object).await;
                true
            }
            other => {
                debug!(kind = other, ?change, "Ignoring object of unwatched kind");
                false
            }
        }
    }

    pub async fn observe_namespace(&self, namespace: KubeObject) {
        let name = namespace.metadata.name.clone();
        debug!(namespace = %name, "Observed namespace");
        self.namespaces.write().await.insert(name, namespace);
    }

    pub async fn observe_claim(&self, claim: KubeObject) {
        let key = (
            claim.metadata.namespace.clone().unwrap_or_default(),
            claim.metadata.name.clone(),
        );
        debug!(namespace = %key.0, claim = %key.1, "Observed resource claim");
        self.claims.write().await.insert(key, claim);
    }

    pub async fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.read().await.contains_key(name)
    }

    /// The requester recorded on a namespace.
    pub async fn namespace_requester(&self, name: &str) -> Option<String> {
        self.namespaces
            .read()
            .await
            .get(name)
            .and_then(|ns| ns.metadata.annotation(REQUESTER_ANNOTATION))
            .map(str::to_string)
    }

    pub async fn claim(&self, namespace: &str, name: &str) -> Option<KubeObject> {
        self.claims
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ObjectMeta;

    fn namespace(name: &str, requester: Option<&str>) -> KubeObject {
        let mut metadata = ObjectMeta {
            name: name.to_string(),
            ..Default::default()
        };
        if let Some(user) = requester {
            metadata
                .annotations
                .insert(REQUESTER_ANNOTATION.to_string(), user.to_string());
        }
        KubeObject {
            api_version: "v1".into(),
            kind: NAMESPACE_KIND.into(),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_namespace_requester() {
        let cache = WatchCache::new();
        assert!(!cache.has_namespace("user-alice").await);

        assert!(
            cache
                .observe(ChangeType::Added, namespace("user-alice", Some("alice")))
                .await
        );
        assert!(cache.has_namespace("user-alice").await);
        assert_eq!(
            cache.namespace_requester("user-alice").await.as_deref(),
            Some("alice")
        );

        cache
            .observe(ChangeType::Added, namespace("bare", None))
            .await;
        assert_eq!(cache.namespace_requester("bare").await, None);
    }

    #[tokio::test]
    async fn test_deleted_namespace_is_kept() {
        let cache = WatchCache::new();
        cache
            .observe(ChangeType::Deleted, namespace("user-bob", Some("bob")))
            .await;
        assert!(cache.has_namespace("user-bob").await);
    }

    #[tokio::test]
    async fn test_claims_are_keyed_by_namespace() {
        let cache = WatchCache::new();
        let claim = KubeObject {
            api_version: "poolboy.gpte.redhat.com/v1".into(),
            kind: RESOURCE_CLAIM_KIND.into(),
            metadata: ObjectMeta {
                name: "env1-abc".into(),
                namespace: Some("user-alice".into()),
                ..Default::default()
            },
        };
        cache.observe(ChangeType::Added, claim).await;

        assert!(cache.claim("user-alice", "env1-abc").await.is_some());
        assert!(cache.claim("user-bob", "env1-abc").await.is_none());
    }

    #[tokio::test]
    async fn test_other_kinds_are_ignored() {
        let cache = WatchCache::new();
        let pod = KubeObject {
            kind: "Pod".into(),
            ..Default::default()
        };
        assert!(!cache.observe(ChangeType::Added, pod).await);
    }
}
