//! Readiness rules per resource kind

use super::{KindHandler, Target, ClusterResultExt, count_at};
use cluster::{Client, Labels, ResourceKind, string_map};
use orchestrator::{LiveObject, Meta, ResourceStatus, SUCCESS_FACTOR_KEY, required_percentage};
use serde_json::Value;

/// Config maps and secrets: ready once they exist
#[derive(Debug)]
pub struct Present;

impl KindHandler for Present {
    fn status(&self, _: &Target, _: &Client, _: &LiveObject, _: &Meta) -> orchestrator::Result<ResourceStatus> {
        Ok(ResourceStatus::Ready)
    }
}

/// Persistent volume claims: ready once bound
#[derive(Debug)]
pub struct Claim;

impl KindHandler for Claim {
    fn status(&self, _: &Target, _: &Client, live: &LiveObject, _: &Meta) -> orchestrator::Result<ResourceStatus> {
        Ok(match phase(live) {
            Some("Bound") => ResourceStatus::Ready,
            Some("Lost") => ResourceStatus::Error,
            _ => ResourceStatus::NotReady,
        })
    }
}

#[derive(Debug)]
pub struct PodHandler;

impl KindHandler for PodHandler {
    fn status(&self, _: &Target, _: &Client, live: &LiveObject, _: &Meta) -> orchestrator::Result<ResourceStatus> {
        Ok(pod_status(live))
    }
}

#[derive(Debug)]
pub struct JobHandler;

impl KindHandler for JobHandler {
    fn status(&self, _: &Target, _: &Client, live: &LiveObject, _: &Meta) -> orchestrator::Result<ResourceStatus> {
        Ok(job_status(live))
    }
}

/// Deployments: all replicas updated and available, or `success_factor`
/// percent of them available
#[derive(Debug)]
pub struct DeploymentHandler;

impl KindHandler for DeploymentHandler {
    fn status(&self, target: &Target, _: &Client, live: &LiveObject, meta: &Meta) -> orchestrator::Result<ResourceStatus> {
        let desired = desired_replicas(live);
        let available = count_at(live, "/status/availableReplicas").unwrap_or(0);

        let ready = if meta.contains_key(SUCCESS_FACTOR_KEY) {
            let factor = required_percentage(&target.key(), meta)?;
            available * 100 >= desired * u64::from(factor)
        } else {
            let updated = count_at(live, "/status/updatedReplicas").unwrap_or(0);
            updated >= desired && available >= desired
        };
        Ok(readiness(ready))
    }

    fn partial(&self) -> bool {
        true
    }

    fn replicas(&self, live: &LiveObject) -> Option<(u64, u64)> {
        Some((
            count_at(live, "/status/availableReplicas").unwrap_or(0),
            desired_replicas(live),
        ))
    }

    fn cacheable(&self, meta: &Meta) -> bool {
        !meta.contains_key(SUCCESS_FACTOR_KEY)
    }
}

#[derive(Debug)]
pub struct ReplicaSetHandler;

impl KindHandler for ReplicaSetHandler {
    fn status(&self, target: &Target, _: &Client, live: &LiveObject, meta: &Meta) -> orchestrator::Result<ResourceStatus> {
        let factor = required_percentage(&target.key(), meta)?;
        Ok(replicaset_status(live, factor))
    }

    fn partial(&self) -> bool {
        true
    }

    fn replicas(&self, live: &LiveObject) -> Option<(u64, u64)> {
        Some((count_at(live, "/status/replicas").unwrap_or(0), desired_replicas(live)))
    }

    fn cacheable(&self, meta: &Meta) -> bool {
        !meta.contains_key(SUCCESS_FACTOR_KEY)
    }
}

/// Stateful sets: every pod selected by the template labels is ready and
/// there are at least as many as desired
#[derive(Debug)]
pub struct StatefulSetHandler;

impl KindHandler for StatefulSetHandler {
    fn status(&self, target: &Target, client: &Client, live: &LiveObject, _: &Meta) -> orchestrator::Result<ResourceStatus> {
        let labels = string_map(live.pointer("/spec/template/metadata/labels"));
        let desired = desired_replicas(live);
        if labels.is_empty() {
            return Ok(readiness(desired == 0));
        }

        let pods = client
            .list(ResourceKind::Pod, target.namespace(), &labels)
            .for_key(&target.key())?;
        let statuses: Vec<_> = pods.iter().map(pod_status).collect();
        if statuses.contains(&ResourceStatus::Error) {
            return Ok(ResourceStatus::Error);
        }
        let ready = statuses.iter().filter(|s| **s == ResourceStatus::Ready).count() as u64;
        Ok(readiness(ready == statuses.len() as u64 && ready >= desired))
    }

    fn cacheable(&self, _meta: &Meta) -> bool {
        false
    }
}

/// Services: every pod, job and replica set matched by the selector is
/// ready
#[derive(Debug)]
pub struct ServiceHandler;

impl KindHandler for ServiceHandler {
    fn status(&self, target: &Target, client: &Client, live: &LiveObject, _: &Meta) -> orchestrator::Result<ResourceStatus> {
        let selector = string_map(live.pointer("/spec/selector"));
        if selector.is_empty() {
            return Ok(ResourceStatus::Ready);
        }
        log::debug!("checking objects behind {} matching {selector:?}", target.key());

        let select = |kind: ResourceKind| -> orchestrator::Result<Vec<Value>> {
            client
                .list(kind, target.namespace(), &selector)
                .for_key(&target.key())
        };
        let mut statuses = Vec::new();
        statuses.extend(select(ResourceKind::Pod)?.iter().map(pod_status));
        statuses.extend(select(ResourceKind::Job)?.iter().map(job_status));
        statuses.extend(
            select(ResourceKind::ReplicaSet)?
                .iter()
                .map(|rs| replicaset_status(rs, 100)),
        );
        Ok(combine(&statuses))
    }

    fn cacheable(&self, _meta: &Meta) -> bool {
        false
    }
}

/// `Succeeded`, or `Running` with every `Ready` condition true
pub fn pod_status(pod: &Value) -> ResourceStatus {
    match phase(pod) {
        Some("Succeeded") => ResourceStatus::Ready,
        Some("Failed") => ResourceStatus::Error,
        Some("Running") => {
            let conditions = pod
                .pointer("/status/conditions")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let ready = conditions
                .iter()
                .filter(|c| c.get("type").and_then(Value::as_str) == Some("Ready"))
                .all(|c| c.get("status").and_then(Value::as_str) == Some("True"));
            readiness(ready)
        }
        _ => ResourceStatus::NotReady,
    }
}

/// Enough successful completions; a `Failed` condition is an error
pub fn job_status(job: &Value) -> ResourceStatus {
    let failed = job
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .is_some_and(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some("Failed")
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        });
    if failed {
        return ResourceStatus::Error;
    }
    let completions = count_at(job, "/spec/completions").unwrap_or(1);
    let succeeded = count_at(job, "/status/succeeded").unwrap_or(0);
    readiness(succeeded >= completions)
}

/// `status.replicas * 100 >= spec.replicas * factor`
pub fn replicaset_status(rs: &Value, factor: u32) -> ResourceStatus {
    let observed = count_at(rs, "/status/replicas").unwrap_or(0);
    readiness(observed * 100 >= desired_replicas(rs) * u64::from(factor))
}

fn desired_replicas(object: &Value) -> u64 {
    count_at(object, "/spec/replicas").unwrap_or(1)
}

fn phase(object: &Value) -> Option<&str> {
    object.pointer("/status/phase").and_then(Value::as_str)
}

fn readiness(ready: bool) -> ResourceStatus {
    if ready {
        ResourceStatus::Ready
    } else {
        ResourceStatus::NotReady
    }
}

/// Error wins over not-ready; an empty selection is ready
fn combine(statuses: &[ResourceStatus]) -> ResourceStatus {
    if statuses.contains(&ResourceStatus::Error) {
        ResourceStatus::Error
    } else if statuses.iter().all(|s| *s == ResourceStatus::Ready) {
        ResourceStatus::Ready
    } else {
        ResourceStatus::NotReady
    }
}

/// Labels a workload stamps on the objects it produces
pub fn template_labels(manifest: &Value) -> Labels {
    string_map(manifest.pointer("/spec/template/metadata/labels"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster::backend::memory::MemoryBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn client(memory: &MemoryBackend) -> Client {
        Client::with_backend(Arc::new(memory.clone()), "default")
    }

    fn pod(name: &str, app: &str, phase: &str, ready: &str) -> Value {
        json!({
            "metadata": {"name": name, "labels": {"app": app}},
            "status": {"phase": phase, "conditions": [{"type": "Ready", "status": ready}]}
        })
    }

    #[test]
    fn test_pod_status() {
        assert_eq!(pod_status(&pod("a", "web", "Running", "True")), ResourceStatus::Ready);
        assert_eq!(pod_status(&pod("a", "web", "Running", "False")), ResourceStatus::NotReady);
        assert_eq!(pod_status(&pod("a", "web", "Pending", "False")), ResourceStatus::NotReady);
        assert_eq!(pod_status(&pod("a", "web", "Succeeded", "False")), ResourceStatus::Ready);
        assert_eq!(pod_status(&pod("a", "web", "Failed", "False")), ResourceStatus::Error);
    }

    #[test]
    fn test_job_status() {
        assert_eq!(job_status(&json!({"status": {"succeeded": 1}})), ResourceStatus::Ready);
        assert_eq!(
            job_status(&json!({"spec": {"completions": 3}, "status": {"succeeded": 2}})),
            ResourceStatus::NotReady
        );
        assert_eq!(
            job_status(&json!({"status": {"conditions": [{"type": "Failed", "status": "True"}]}})),
            ResourceStatus::Error
        );
    }

    #[test]
    fn test_replicaset_factor() {
        let rs = json!({"spec": {"replicas": 10}, "status": {"replicas": 5}});
        assert_eq!(replicaset_status(&rs, 100), ResourceStatus::NotReady);
        assert_eq!(replicaset_status(&rs, 50), ResourceStatus::Ready);
        assert_eq!(replicaset_status(&rs, 51), ResourceStatus::NotReady);
    }

    #[test]
    fn test_deployment_status() {
        let memory = MemoryBackend::new();
        let target = Target::new(ResourceKind::Deployment, "web");
        let live = json!({
            "spec": {"replicas": 4},
            "status": {"updatedReplicas": 4, "availableReplicas": 2}
        });

        let status = DeploymentHandler
            .status(&target, &client(&memory), &live, &Meta::new())
            .unwrap();
        assert_eq!(status, ResourceStatus::NotReady);

        let meta = Meta::from([(SUCCESS_FACTOR_KEY.to_string(), "50".to_string())]);
        let status = DeploymentHandler
            .status(&target, &client(&memory), &live, &meta)
            .unwrap();
        assert_eq!(status, ResourceStatus::Ready);
        assert!(!DeploymentHandler.cacheable(&meta));
        assert_eq!(DeploymentHandler.replicas(&live), Some((2, 4)));
    }

    #[test]
    fn test_invalid_success_factor() {
        let memory = MemoryBackend::new();
        let target = Target::new(ResourceKind::ReplicaSet, "web");
        let meta = Meta::from([(SUCCESS_FACTOR_KEY.to_string(), "most".to_string())]);
        let err = ReplicaSetHandler
            .status(&target, &client(&memory), &json!({}), &meta)
            .unwrap_err();
        assert!(matches!(err, orchestrator::Error::InvalidPercentage { .. }));
    }

    #[test]
    fn test_service_follows_selected_pods() {
        let memory = MemoryBackend::new();
        memory.insert(ResourceKind::Pod, "default", pod("web-1", "web", "Running", "True")).unwrap();
        memory.insert(ResourceKind::Pod, "default", pod("web-2", "web", "Pending", "False")).unwrap();
        memory.insert(ResourceKind::Pod, "default", pod("db-1", "db", "Running", "True")).unwrap();

        let target = Target::new(ResourceKind::Service, "web");
        let live = json!({"spec": {"selector": {"app": "web"}}});
        let status = |memory: &MemoryBackend| {
            ServiceHandler
                .status(&target, &client(memory), &live, &Meta::new())
                .unwrap()
        };
        assert_eq!(status(&memory), ResourceStatus::NotReady);

        memory.update(ResourceKind::Pod, "default", "web-2", |p| {
            *p = pod("web-2", "web", "Running", "True");
        });
        assert_eq!(status(&memory), ResourceStatus::Ready);
        assert!(!ServiceHandler.cacheable(&Meta::new()));
    }

    #[test]
    fn test_service_includes_jobs_and_replicasets() {
        let memory = MemoryBackend::new();
        memory
            .insert(
                ResourceKind::Job,
                "default",
                json!({"metadata": {"name": "migrate", "labels": {"app": "api"}}, "status": {"succeeded": 1}}),
            )
            .unwrap();
        memory
            .insert(
                ResourceKind::ReplicaSet,
                "default",
                json!({
                    "metadata": {"name": "api-1", "labels": {"app": "api"}},
                    "spec": {"replicas": 2},
                    "status": {"replicas": 1}
                }),
            )
            .unwrap();

        let target = Target::new(ResourceKind::Service, "api");
        let live = json!({"spec": {"selector": {"app": "api"}}});
        let status = ServiceHandler
            .status(&target, &client(&memory), &live, &Meta::new())
            .unwrap();
        assert_eq!(status, ResourceStatus::NotReady);
    }

    #[test]
    fn test_service_without_selector_is_ready() {
        let memory = MemoryBackend::new();
        let target = Target::new(ResourceKind::Service, "external");
        let status = ServiceHandler
            .status(&target, &client(&memory), &json!({"spec": {}}), &Meta::new())
            .unwrap();
        assert_eq!(status, ResourceStatus::Ready);
    }

    #[test]
    fn test_statefulset_counts_pods() {
        let memory = MemoryBackend::new();
        let target = Target::new(ResourceKind::StatefulSet, "db");
        let live = json!({
            "spec": {"replicas": 2, "template": {"metadata": {"labels": {"app": "db"}}}}
        });
        let status = |memory: &MemoryBackend| {
            StatefulSetHandler
                .status(&target, &client(memory), &live, &Meta::new())
                .unwrap()
        };

        memory.insert(ResourceKind::Pod, "default", pod("db-0", "db", "Running", "True")).unwrap();
        assert_eq!(status(&memory), ResourceStatus::NotReady);

        memory.insert(ResourceKind::Pod, "default", pod("db-1", "db", "Running", "True")).unwrap();
        assert_eq!(status(&memory), ResourceStatus::Ready);
    }

    #[test]
    fn test_claim_bound() {
        let memory = MemoryBackend::new();
        let target = Target::new(ResourceKind::PersistentVolumeClaim, "data");
        let bound = json!({"status": {"phase": "Bound"}});
        let pending = json!({"status": {"phase": "Pending"}});
        let client = client(&memory);
        assert_eq!(Claim.status(&target, &client, &bound, &Meta::new()).unwrap(), ResourceStatus::Ready);
        assert_eq!(Claim.status(&target, &client, &pending, &Meta::new()).unwrap(), ResourceStatus::NotReady);
    }
}
