//! Backend traits and implementations for reaching the cluster API.
//!
//! [`http::HttpBackend`] speaks the REST conventions of a Kubernetes API
//! server. [`memory::MemoryBackend`] keeps objects in memory and is used
//! by tests and dry runs:
//!
//! ```
//! use cluster::backend::{Backend, memory::MemoryBackend};
//! use cluster::ResourceKind;
//! use serde_json::json;
//!
//! let backend = MemoryBackend::new();
//! backend
//!     .create(ResourceKind::ConfigMap, "default", &json!({"metadata": {"name": "settings"}}))
//!     .unwrap();
//!
//! let live = backend.get(ResourceKind::ConfigMap, "default", "settings").unwrap();
//! assert!(live.is_some());
//! ```

pub mod http;
pub mod memory;

use crate::error::Result;
use crate::types::{Labels, ResourceKind};
use serde_json::Value;

/// Backend trait for cluster API access.
///
/// Objects are plain JSON documents addressed by kind, namespace and name.
pub trait Backend: Send + Sync {
    /// Fetch one object, `None` when it does not exist.
    fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>>;

    /// Create an object and return it as persisted.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyExists` (or HTTP 409) if the name is taken.
    fn create(&self, kind: ResourceKind, namespace: &str, object: &Value) -> Result<Value>;

    /// Delete one object.
    fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<()>;

    /// List objects whose labels match every pair of `selector`.
    fn list(&self, kind: ResourceKind, namespace: &str, selector: &Labels) -> Result<Vec<Value>>;
}
