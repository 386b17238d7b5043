//! Existing resource - managed outside the run, only observed

use super::{KindHandler, Target, handler_for, replica_report};
use cluster::Client;
use orchestrator::{
    Capabilities, CreateOutcome, DependencyReport, Error, LiveObject, Meta, Resource, ResourceStatus, Result,
};
use std::fmt;

/// A resource that must already be present; never created nor deleted
pub struct ExistingResource {
    target: Target,
    handler: &'static dyn KindHandler,
    client: Client,
}

impl ExistingResource {
    pub fn new(target: Target, client: Client) -> Self {
        Self {
            handler: handler_for(target.kind),
            target,
            client,
        }
    }

    fn missing(&self) -> Error {
        Error::MissingExisting { key: self.key() }
    }
}

impl Resource for ExistingResource {
    fn key(&self) -> String {
        self.target.key()
    }

    fn kind(&self) -> &'static str {
        self.target.kind.name()
    }

    fn is_existing(&self) -> bool {
        true
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

    /// Nothing is declared beyond the name
    fn equal_to_declaration(&self, _live: &LiveObject) -> bool {
        true
    }

    fn create(&self) -> Result<CreateOutcome> {
        log::debug!("looking for pre-existing {}", self.key());
        match self.lookup()? {
            Some(_) => Ok(CreateOutcome::Found),
            None => Err(self.missing()),
        }
    }

    fn delete(&self) -> Result<()> {
        Err(Error::Unsupported {
            key: self.key(),
            operation: "deleting a pre-existing resource",
        })
    }

    fn status(&self, meta: &Meta) -> Result<ResourceStatus> {
        let live = self.lookup()?.ok_or_else(|| self.missing())?;
        self.handler.status(&self.target, &self.client, &live, meta)
    }

    fn dependency_report(&self, meta: &Meta) -> Result<DependencyReport> {
        replica_report(&self.target, self.handler, &self.client, meta)
    }

    fn status_is_cacheable(&self, meta: &Meta) -> bool {
        self.handler.cacheable(meta)
    }
}

impl fmt::Debug for ExistingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExistingResource")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
