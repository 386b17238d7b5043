//! # cluster
//!
//! Minimal blocking access to a Kubernetes-style cluster API.
//!
//! Objects are handled as plain JSON documents; the crate only knows how
//! to address them (kind, namespace, name) and how to classify failures.
//!
//! ## Example
//!
//! ```no_run
//! use cluster::{Client, ResourceKind};
//! use cluster::backend::http::HttpConfig;
//!
//! let client = Client::http(HttpConfig::default(), "default");
//! if let Some(live) = client.get(ResourceKind::Deployment, None, "web").unwrap() {
//!     println!("{}", live["status"]);
//! }
//! ```
//!
//! ## Backends
//!
//! - `http`: REST calls through `ureq` (works with `kubectl proxy`)
//! - `memory`: in-process store for tests and dry runs

pub mod backend;
pub mod error;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{Labels, ResourceKind, labels_of, matches_selector, selector_query, string_map};

use backend::Backend;
use backend::http::{HttpBackend, HttpConfig};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// High-level client bound to a default namespace.
///
/// Cheap to clone; every adapter receives its own handle.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    namespace: String,
}

impl Client {
    /// Create a client talking HTTP to an API server.
    pub fn http(config: HttpConfig, namespace: impl Into<String>) -> Self {
        Self::with_backend(Arc::new(HttpBackend::new(config)), namespace)
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Arc<dyn Backend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// Default namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn resolve<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(&self.namespace)
    }

    /// Fetch one object, `None` when absent.
    pub fn get(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> Result<Option<Value>> {
        let namespace = self.resolve(namespace);
        log::trace!("get {kind} {namespace}/{name}");
        self.backend.get(kind, namespace, name)
    }

    /// Create an object.
    pub fn create(&self, kind: ResourceKind, namespace: Option<&str>, object: &Value) -> Result<Value> {
        let namespace = self.resolve(namespace);
        log::debug!("create {kind} in {namespace}");
        self.backend.create(kind, namespace, object)
    }

    /// Delete an object.
    pub fn delete(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> Result<()> {
        let namespace = self.resolve(namespace);
        log::debug!("delete {kind} {namespace}/{name}");
        self.backend.delete(kind, namespace, name)
    }

    /// List objects matching a label selector.
    pub fn list(&self, kind: ResourceKind, namespace: Option<&str>, selector: &Labels) -> Result<Vec<Value>> {
        let namespace = self.resolve(namespace);
        log::trace!("list {kind} in {namespace} matching {}", selector_query(selector));
        self.backend.list(kind, namespace, selector)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::memory::MemoryBackend;
    use serde_json::json;

    #[test]
    fn test_default_namespace_applied() {
        let memory = MemoryBackend::new();
        let client = Client::with_backend(Arc::new(memory.clone()), "staging");

        client
            .create(ResourceKind::ConfigMap, None, &json!({"metadata": {"name": "settings"}}))
            .unwrap();

        assert!(memory.get(ResourceKind::ConfigMap, "staging", "settings").unwrap().is_some());
        assert!(client.get(ResourceKind::ConfigMap, Some("default"), "settings").unwrap().is_none());
        assert_eq!(client.namespace(), "staging");
    }

    #[test]
    fn test_clones_share_backend() {
        let client = Client::with_backend(Arc::new(MemoryBackend::new()), "default");
        let other = client.clone();

        client
            .create(ResourceKind::Secret, None, &json!({"metadata": {"name": "token"}}))
            .unwrap();
        other.delete(ResourceKind::Secret, None, "token").unwrap();
        assert!(client.get(ResourceKind::Secret, None, "token").unwrap().is_none());
    }
}
