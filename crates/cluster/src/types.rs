//! Resource kinds, API paths and label selectors.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Labels or a label selector (`key = value` pairs).
pub type Labels = BTreeMap<String, String>;

/// Resource kinds the client knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    ConfigMap,
    Secret,
    PersistentVolumeClaim,
    Pod,
    Job,
    Deployment,
    ReplicaSet,
    StatefulSet,
    Service,
}

impl ResourceKind {
    /// All supported kinds.
    pub const ALL: [Self; 9] = [
        Self::ConfigMap,
        Self::Secret,
        Self::PersistentVolumeClaim,
        Self::Pod,
        Self::Job,
        Self::Deployment,
        Self::ReplicaSet,
        Self::StatefulSet,
        Self::Service,
    ];

    /// Lowercase name used in resource keys (`deployment/web`).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConfigMap => "configmap",
            Self::Secret => "secret",
            Self::PersistentVolumeClaim => "persistentvolumeclaim",
            Self::Pod => "pod",
            Self::Job => "job",
            Self::Deployment => "deployment",
            Self::ReplicaSet => "replicaset",
            Self::StatefulSet => "statefulset",
            Self::Service => "service",
        }
    }

    /// `kind` field as written in manifests.
    #[must_use]
    pub fn api_kind(&self) -> &'static str {
        match self {
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::Pod => "Pod",
            Self::Job => "Job",
            Self::Deployment => "Deployment",
            Self::ReplicaSet => "ReplicaSet",
            Self::StatefulSet => "StatefulSet",
            Self::Service => "Service",
        }
    }

    /// `apiVersion` of the group serving this kind.
    #[must_use]
    pub fn api_version(&self) -> &'static str {
        match self {
            Self::Job => "batch/v1",
            Self::Deployment | Self::ReplicaSet | Self::StatefulSet => "apps/v1",
            _ => "v1",
        }
    }

    /// Plural path segment.
    #[must_use]
    pub fn plural(&self) -> &'static str {
        match self {
            Self::ConfigMap => "configmaps",
            Self::Secret => "secrets",
            Self::PersistentVolumeClaim => "persistentvolumeclaims",
            Self::Pod => "pods",
            Self::Job => "jobs",
            Self::Deployment => "deployments",
            Self::ReplicaSet => "replicasets",
            Self::StatefulSet => "statefulsets",
            Self::Service => "services",
        }
    }

    /// Path of the namespaced collection, e.g. `/apis/apps/v1/namespaces/default/deployments`.
    #[must_use]
    pub fn collection_path(&self, namespace: &str) -> String {
        let group = match self.api_version() {
            "v1" => "api/v1".to_string(),
            other => format!("apis/{other}"),
        };
        format!("/{group}/namespaces/{namespace}/{}", self.plural())
    }

    /// Path of one object.
    #[must_use]
    pub fn object_path(&self, namespace: &str, name: &str) -> String {
        format!("{}/{name}", self.collection_path(namespace))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    /// Accepts the manifest spelling, the lowercase name or the plural.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == lower || k.plural() == lower)
            .or_else(|| match lower.as_str() {
                "pvc" => Some(Self::PersistentVolumeClaim),
                "svc" => Some(Self::Service),
                _ => None,
            })
            .ok_or_else(|| Error::UnsupportedKind(s.to_string()))
    }
}

/// Render a selector as a `labelSelector` query value (`a=b,c=d`).
#[must_use]
pub fn selector_query(selector: &Labels) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// `metadata.labels` of an object.
#[must_use]
pub fn labels_of(object: &Value) -> Labels {
    string_map(object.pointer("/metadata/labels"))
}

/// Convert a JSON object of scalars to a string map.
///
/// Non-string scalars are rendered as JSON; anything that is not an
/// object yields an empty map.
#[must_use]
pub fn string_map(value: Option<&Value>) -> Labels {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let v = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                    (k.clone(), v)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Whether `labels` contain every pair of `selector`.
///
/// An empty selector matches everything, as in a list without `labelSelector`.
#[must_use]
pub fn matches_selector(labels: &Labels, selector: &Labels) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// `metadata.name` of a manifest.
pub fn name_of(object: &Value) -> Result<&str> {
    object
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::InvalidManifest("metadata.name is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Deployment".parse::<ResourceKind>().unwrap(), ResourceKind::Deployment);
        assert_eq!("replicasets".parse::<ResourceKind>().unwrap(), ResourceKind::ReplicaSet);
        assert_eq!("pvc".parse::<ResourceKind>().unwrap(), ResourceKind::PersistentVolumeClaim);
        assert!(matches!(
            "DaemonSet".parse::<ResourceKind>(),
            Err(Error::UnsupportedKind(ref k)) if k == "DaemonSet"
        ));
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            ResourceKind::ConfigMap.object_path("default", "settings"),
            "/api/v1/namespaces/default/configmaps/settings"
        );
        assert_eq!(
            ResourceKind::Deployment.collection_path("prod"),
            "/apis/apps/v1/namespaces/prod/deployments"
        );
        assert_eq!(
            ResourceKind::Job.object_path("ci", "migrate"),
            "/apis/batch/v1/namespaces/ci/jobs/migrate"
        );
    }

    #[test]
    fn test_selector_query_is_sorted() {
        let selector: Labels = [("tier", "front"), ("app", "web")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(selector_query(&selector), "app=web,tier=front");
    }

    #[test]
    fn test_matches_selector() {
        let object = json!({"metadata": {"labels": {"app": "web", "tier": "front", "replicas": 3}}});
        let labels = labels_of(&object);
        assert_eq!(labels.get("replicas").map(String::as_str), Some("3"));

        let mut selector = Labels::new();
        assert!(matches_selector(&labels, &selector));
        selector.insert("app".into(), "web".into());
        assert!(matches_selector(&labels, &selector));
        selector.insert("tier".into(), "back".into());
        assert!(!matches_selector(&labels, &selector));
    }

    #[test]
    fn test_name_of() {
        assert_eq!(name_of(&json!({"metadata": {"name": "web"}})).unwrap(), "web");
        assert!(name_of(&json!({"metadata": {}})).is_err());
    }
}
