//! Managed resource - declared manifest, created by the run

use super::{ClusterResultExt, KindHandler, Target, handler_for, matches_declaration, replica_report};
use cluster::Client;
use orchestrator::{
    Capabilities, CreateOutcome, DependencyReport, LiveObject, Meta, Resource, ResourceStatus, Result,
};
use serde_json::Value;
use std::fmt;

/// A resource whose manifest is declared and created by the run
pub struct ManagedResource {
    target: Target,
    manifest: Value,
    handler: &'static dyn KindHandler,
    client: Client,
}

impl ManagedResource {
    pub fn new(target: Target, manifest: Value, client: Client) -> Self {
        Self {
            handler: handler_for(target.kind),
            target,
            manifest,
            client,
        }
    }

    /// Compare an existing object with the declaration
    fn classify(&self, live: &LiveObject) -> CreateOutcome {
        if self.equal_to_declaration(live) {
            CreateOutcome::AlreadyExists
        } else {
            log::warn!("{} differs from its declaration, leaving it untouched", self.key());
            CreateOutcome::Drifted
        }
    }
}

impl Resource for ManagedResource {
    fn key(&self) -> String {
        self.target.key()
    }

    fn kind(&self) -> &'static str {
        self.target.kind.name()
    }

    fn capabilities(&self) -> Capabilities {
        if self.handler.partial() {
            Capabilities::partial()
        } else {
            Capabilities::default()
        }
    }

    fn lookup(&self) -> Result<Option<LiveObject>> {
        self.target.fetch(&self.client)
    }

    fn equal_to_declaration(&self, live: &LiveObject) -> bool {
        matches_declaration(&self.manifest, live)
    }

    fn create(&self) -> Result<CreateOutcome> {
        if let Some(live) = self.lookup()? {
            return Ok(self.classify(&live));
        }

        log::info!("creating {}", self.key());
        match self
            .client
            .create(self.target.kind, self.target.namespace(), &self.manifest)
        {
            Ok(_) => Ok(CreateOutcome::Created),
            // Someone else created it between lookup and create
            Err(cluster::Error::AlreadyExists { .. }) => match self.lookup()? {
                Some(live) => Ok(self.classify(&live)),
                None => Err(orchestrator::Error::transient(
                    self.key(),
                    "object reported as existing but not found",
                )),
            },
            Err(e) => Err(e).for_key(&self.key()),
        }
    }

    fn delete(&self) -> Result<()> {
        match self
            .client
            .delete(self.target.kind, self.target.namespace(), &self.target.name)
        {
            Err(e) if e.is_not_found() => Ok(()),
            other => other.for_key(&self.key()),
        }
    }

    fn status(&self, meta: &Meta) -> Result<ResourceStatus> {
        // Not visible yet right after a create
        let Some(live) = self.lookup()? else {
            return Ok(ResourceStatus::NotReady);
        };
        if !self.equal_to_declaration(&live) {
            return Ok(ResourceStatus::WaitingForUpgrade);
        }
        self.handler.status(&self.target, &self.client, &live, meta)
    }

    fn dependency_report(&self, meta: &Meta) -> Result<DependencyReport> {
        replica_report(&self.target, self.handler, &self.client, meta)
    }

    fn status_is_cacheable(&self, meta: &Meta) -> bool {
        self.handler.cacheable(meta)
    }
}

impl fmt::Debug for ManagedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedResource")
            .field("target", &self.target)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster::ResourceKind;
    use cluster::backend::memory::MemoryBackend;
    use cluster::backend::Backend;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (MemoryBackend, Client) {
        let memory = MemoryBackend::new();
        let client = Client::with_backend(Arc::new(memory.clone()), "default");
        (memory, client)
    }

    fn config_map(client: &Client, mode: &str) -> ManagedResource {
        ManagedResource::new(
            Target::new(ResourceKind::ConfigMap, "settings"),
            json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "settings"}, "data": {"mode": mode}}),
            client.clone(),
        )
    }

    #[test]
    fn test_create_then_already_exists() {
        let (memory, client) = setup();
        let resource = config_map(&client, "fast");

        assert_eq!(resource.create().unwrap(), CreateOutcome::Created);
        assert_eq!(resource.create().unwrap(), CreateOutcome::AlreadyExists);
        assert_eq!(memory.created(), vec!["configmap/settings"]);
        assert_eq!(resource.status(&Meta::new()).unwrap(), ResourceStatus::Ready);
    }

    #[test]
    fn test_drift_is_reported_not_overwritten() {
        let (memory, client) = setup();
        config_map(&client, "fast").create().unwrap();

        let changed = config_map(&client, "slow");
        assert_eq!(changed.create().unwrap(), CreateOutcome::Drifted);
        assert_eq!(changed.status(&Meta::new()).unwrap(), ResourceStatus::WaitingForUpgrade);

        let live = memory.get(ResourceKind::ConfigMap, "default", "settings").unwrap().unwrap();
        assert_eq!(live["data"]["mode"], "fast");
    }

    #[test]
    fn test_transient_failure_is_retryable() {
        let (memory, client) = setup();
        memory.fail_next(1);
        let err = config_map(&client, "fast").create().unwrap_err();
        assert!(err.is_retryable());
        assert!(memory.created().is_empty());
    }

    #[test]
    fn test_delete_absent_is_ok() {
        let (_memory, client) = setup();
        let resource = config_map(&client, "fast");
        resource.delete().unwrap();
        resource.create().unwrap();
        resource.delete().unwrap();
        assert!(resource.lookup().unwrap().is_none());
    }

    #[test]
    fn test_deployment_partial_report() {
        let (memory, client) = setup();
        let resource = ManagedResource::new(
            Target::new(ResourceKind::Deployment, "web"),
            json!({"metadata": {"name": "web"}, "spec": {"replicas": 4}}),
            client,
        );
        assert!(resource.capabilities().partial_report);
        resource.create().unwrap();
        memory.update(ResourceKind::Deployment, "default", "web", |d| {
            d["status"] = json!({"availableReplicas": 2, "updatedReplicas": 4});
        });

        let meta = Meta::from([("success_factor".to_string(), "50".to_string())]);
        let report = resource.dependency_report(&meta).unwrap();
        assert_eq!((report.percentage, report.needed, report.blocks), (50, 50, false));
        assert_eq!(report.message, "2 of 4 replicas up (50%, needed 50%)");
        assert!(!resource.status_is_cacheable(&meta));
        assert!(resource.status_is_cacheable(&Meta::new()));
    }

    #[test]
    fn test_status_before_visible() {
        let (_memory, client) = setup();
        let resource = config_map(&client, "fast");
        assert_eq!(resource.status(&Meta::new()).unwrap(), ResourceStatus::NotReady);
    }
}
