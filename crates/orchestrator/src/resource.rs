//! Resource contract consumed by the orchestration engine
//!
//! Every resource kind (workload, service, config object, storage claim)
//! is bound to the graph through one adapter implementing [`Resource`].
//! Optional capabilities are advertised through [`Capabilities`] flags
//! rather than discovered at runtime.

use crate::error::{Error, Result};
use crate::report::DependencyReport;
use crate::types::{CreateOutcome, Meta, ResourceStatus};
use std::fmt;
use std::sync::Arc;

/// A live object as returned by the remote system
pub type LiveObject = serde_json::Value;

/// Optional capabilities of a resource adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Adapter implements [`Resource::dependency_report`]
    pub partial_report: bool,
}

impl Capabilities {
    /// Capabilities of an adapter that supports partial readiness
    pub fn partial() -> Self {
        Self {
            partial_report: true,
        }
    }
}

/// Core trait for resources managed by the engine
///
/// Two flavours share this contract: managed resources (create issues a
/// real mutation) and pre-existing resources (create only verifies the
/// object is present). Status and report behaviour is identical.
///
/// # Example
///
/// ```ignore
/// use orchestrator::{CreateOutcome, LiveObject, Meta, Resource, ResourceStatus, Result};
///
/// #[derive(Debug)]
/// struct Marker { name: String }
///
/// impl Resource for Marker {
///     fn key(&self) -> String { format!("marker/{}", self.name) }
///     fn kind(&self) -> &'static str { "marker" }
///     fn lookup(&self) -> Result<Option<LiveObject>> { Ok(None) }
///     fn equal_to_declaration(&self, _live: &LiveObject) -> bool { true }
///     fn create(&self) -> Result<CreateOutcome> { Ok(CreateOutcome::Created) }
///     fn delete(&self) -> Result<()> { Ok(()) }
///     fn status(&self, _meta: &Meta) -> Result<ResourceStatus> { Ok(ResourceStatus::Ready) }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Stable identity, unique within a graph (e.g. "deployment/web")
    fn key(&self) -> String;

    /// Resource kind (e.g. "deployment", "service")
    fn kind(&self) -> &'static str;

    /// Whether the backing object is managed outside this system
    fn is_existing(&self) -> bool {
        false
    }

    /// Optional capabilities of this adapter
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Fetch the live object, `None` when absent
    fn lookup(&self) -> Result<Option<LiveObject>>;

    /// Structural comparison of persisted fields against the declaration
    fn equal_to_declaration(&self, live: &LiveObject) -> bool;

    /// Idempotent create
    ///
    /// Must verify whether an equivalent object already exists before
    /// issuing a mutating call, and must report drift rather than
    /// overwrite on mismatch.
    fn create(&self) -> Result<CreateOutcome>;

    /// Delete the backing object
    fn delete(&self) -> Result<()>;

    /// Current readiness, evaluated under the node's configuration
    fn status(&self, meta: &Meta) -> Result<ResourceStatus>;

    /// Partial-readiness report under an edge's configuration
    ///
    /// Only called when [`Capabilities::partial_report`] is set.
    fn dependency_report(&self, _meta: &Meta) -> Result<DependencyReport> {
        Err(Error::Unsupported {
            key: self.key(),
            operation: "dependency reports",
        })
    }

    /// Whether a status result may be reused within one evaluation pass
    ///
    /// Adapters whose readiness depends on a changing selection of other
    /// objects return false.
    fn status_is_cacheable(&self, _meta: &Meta) -> bool {
        true
    }
}

/// A resource shared between the graph and its workers
pub type SharedResource = Arc<dyn Resource>;
