//! Cluster resource adapters for the orchestration engine
//!
//! Every declared object is bound to the graph through one of two
//! adapters:
//! - [`ManagedResource`]: declared payload, `create` issues a real create
//! - [`ExistingResource`]: managed elsewhere, `create` only checks presence
//!
//! Both delegate kind-specific readiness to a [`KindHandler`].

use cluster::{Client, ResourceKind};
use orchestrator::{DependencyReport, LiveObject, Meta, ResourceStatus, required_percentage};
use serde_json::Value;
use std::fmt;

pub mod existing;
pub mod kinds;
pub mod managed;

pub use existing::ExistingResource;
pub use managed::ManagedResource;

/// Address of one object in the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: ResourceKind,
    pub name: String,
    /// `None` means the client's default namespace
    pub namespace: Option<String>,
}

impl Target {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Graph key, e.g. `deployment/web`
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind.name(), self.name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Fetch the live object
    pub fn fetch(&self, client: &Client) -> orchestrator::Result<Option<LiveObject>> {
        client
            .get(self.kind, self.namespace(), &self.name)
            .for_key(&self.key())
    }
}

/// Kind-specific readiness rules
pub trait KindHandler: Send + Sync + fmt::Debug {
    /// Readiness of a live object under the node's configuration
    fn status(
        &self,
        target: &Target,
        client: &Client,
        live: &LiveObject,
        meta: &Meta,
    ) -> orchestrator::Result<ResourceStatus>;

    /// Whether edges may unblock on partial readiness
    fn partial(&self) -> bool {
        false
    }

    /// `(observed, desired)` replica counts for partial reports
    fn replicas(&self, _live: &LiveObject) -> Option<(u64, u64)> {
        None
    }

    fn cacheable(&self, _meta: &Meta) -> bool {
        true
    }
}

/// Handler for a resource kind
pub fn handler_for(kind: ResourceKind) -> &'static dyn KindHandler {
    match kind {
        ResourceKind::ConfigMap | ResourceKind::Secret => &kinds::Present,
        ResourceKind::PersistentVolumeClaim => &kinds::Claim,
        ResourceKind::Pod => &kinds::PodHandler,
        ResourceKind::Job => &kinds::JobHandler,
        ResourceKind::Deployment => &kinds::DeploymentHandler,
        ResourceKind::ReplicaSet => &kinds::ReplicaSetHandler,
        ResourceKind::StatefulSet => &kinds::StatefulSetHandler,
        ResourceKind::Service => &kinds::ServiceHandler,
    }
}

/// Partial-readiness report of a replicated workload under an edge's configuration
pub(crate) fn replica_report(
    target: &Target,
    handler: &dyn KindHandler,
    client: &Client,
    meta: &Meta,
) -> orchestrator::Result<DependencyReport> {
    let key = target.key();
    let needed = required_percentage(&key, meta)?;
    let live = target
        .fetch(client)?
        .ok_or_else(|| orchestrator::Error::transient(&key, "object not found"))?;
    let (observed, desired) = handler
        .replicas(&live)
        .ok_or_else(|| orchestrator::Error::Unsupported {
            key: key.clone(),
            operation: "dependency reports",
        })?;
    Ok(DependencyReport::from_replicas(key, observed, desired, needed))
}

/// Convert cluster failures into engine failures for one resource key
pub trait ClusterResultExt<T> {
    fn for_key(self, key: &str) -> orchestrator::Result<T>;
}

impl<T> ClusterResultExt<T> for cluster::Result<T> {
    fn for_key(self, key: &str) -> orchestrator::Result<T> {
        self.map_err(|e| {
            if e.is_retryable() {
                orchestrator::Error::transient(key, e.to_string())
            } else {
                orchestrator::Error::adapter(key, e.to_string())
            }
        })
    }
}

/// Fields compared against the live object for drift
const COMPARED_FIELDS: [&str; 4] = [
    "/metadata/labels",
    "/metadata/annotations",
    "/spec",
    "/data",
];

/// Whether `live` still carries every declared field with its declared value
///
/// Fields the server adds (defaults, status, uids) are ignored.
pub fn matches_declaration(declared: &Value, live: &Value) -> bool {
    COMPARED_FIELDS
        .iter()
        .all(|pointer| match declared.pointer(pointer) {
            None => true,
            Some(want) => live.pointer(pointer).is_some_and(|have| contains(have, want)),
        })
}

fn contains(live: &Value, declared: &Value) -> bool {
    match (live, declared) {
        (_, Value::Null) => true,
        (Value::Object(have), Value::Object(want)) => want.iter().all(|(k, v)| {
            v.is_null() || have.get(k).is_some_and(|live_value| contains(live_value, v))
        }),
        (Value::Array(have), Value::Array(want)) => {
            have.len() == want.len() && have.iter().zip(want).all(|(h, w)| contains(h, w))
        }
        _ => live == declared,
    }
}

/// Integer at a JSON pointer
pub(crate) fn count_at(object: &Value, pointer: &str) -> Option<u64> {
    object.pointer(pointer).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_key() {
        let target = Target::new(ResourceKind::Deployment, "web").in_namespace("prod");
        assert_eq!(target.key(), "deployment/web");
        assert_eq!(target.namespace(), Some("prod"));
        assert_eq!(Target::new(ResourceKind::Service, "api").namespace(), None);
    }

    #[test]
    fn test_server_defaults_are_not_drift() {
        let declared = json!({
            "metadata": {"name": "web", "labels": {"app": "web"}},
            "spec": {"replicas": 3, "template": {"spec": {"containers": [{"name": "web", "image": "nginx"}]}}}
        });
        let live = json!({
            "metadata": {"name": "web", "uid": "1234", "labels": {"app": "web", "pod-template-hash": "abc"}},
            "spec": {
                "replicas": 3,
                "revisionHistoryLimit": 10,
                "template": {"spec": {"containers": [{"name": "web", "image": "nginx", "imagePullPolicy": "Always"}]}}
            },
            "status": {"readyReplicas": 1}
        });
        assert!(matches_declaration(&declared, &live));
    }

    #[test]
    fn test_changed_field_is_drift() {
        let declared = json!({"metadata": {"name": "web"}, "spec": {"replicas": 3}});
        let live = json!({"metadata": {"name": "web"}, "spec": {"replicas": 5}});
        assert!(!matches_declaration(&declared, &live));

        let declared = json!({"metadata": {"name": "cfg"}, "data": {"mode": "fast"}});
        let live = json!({"metadata": {"name": "cfg"}});
        assert!(!matches_declaration(&declared, &live));
    }

    #[test]
    fn test_list_length_is_compared() {
        let declared = json!({"spec": {"ports": [{"port": 80}]}});
        let live = json!({"spec": {"ports": [{"port": 80}, {"port": 443}]}});
        assert!(!matches_declaration(&declared, &live));
    }

    #[test]
    fn test_error_conversion() {
        let transient: cluster::Result<()> = Err(cluster::Error::http("unavailable", Some(503)));
        assert!(transient.for_key("pod/a").unwrap_err().is_retryable());

        let fatal: cluster::Result<()> = Err(cluster::Error::http("forbidden", Some(403)));
        let err = fatal.for_key("pod/a").unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("pod/a: "));
    }
}
