//! In-memory backend for tests and dry runs.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Labels, ResourceKind, labels_of, matches_selector, name_of};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

type ObjectKey = (ResourceKind, String, String);

/// Cluster backend storing objects in memory.
///
/// Clones share the same store, so a test can keep a handle and mutate
/// objects (e.g. bump `status.readyReplicas`) while a run is in flight.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    objects: Arc<Mutex<BTreeMap<ObjectKey, Value>>>,
    /// Number of upcoming calls that fail with a transient error
    failures: Arc<Mutex<u32>>,
    creates: Arc<Mutex<Vec<String>>>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object as-is, replacing any previous version.
    pub fn insert(&self, kind: ResourceKind, namespace: &str, object: Value) -> Result<()> {
        let name = name_of(&object)?.to_string();
        self.objects
            .lock()
            .insert((kind, namespace.to_string(), name), object);
        Ok(())
    }

    /// Mutate a stored object in place; false when it does not exist.
    pub fn update(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        change: impl FnOnce(&mut Value),
    ) -> bool {
        let mut objects = self.objects.lock();
        match objects.get_mut(&(kind, namespace.to_string(), name.to_string())) {
            Some(object) => {
                change(object);
                true
            }
            None => false,
        }
    }

    /// Make the next `count` calls fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        *self.failures.lock() = count;
    }

    /// Objects created through [`Backend::create`], as `kind/name`.
    #[must_use]
    pub fn created(&self) -> Vec<String> {
        self.creates.lock().clone()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    fn injected_failure(&self) -> Result<()> {
        let mut failures = self.failures.lock();
        if *failures == 0 {
            return Ok(());
        }
        *failures -= 1;
        Err(Error::http("injected failure", Some(503)))
    }
}

impl Backend for MemoryBackend {
    fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>> {
        self.injected_failure()?;
        Ok(self
            .objects
            .lock()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned())
    }

    fn create(&self, kind: ResourceKind, namespace: &str, object: &Value) -> Result<Value> {
        self.injected_failure()?;
        let name = name_of(object)?.to_string();
        let key = (kind, namespace.to_string(), name.clone());

        let mut objects = self.objects.lock();
        if objects.contains_key(&key) {
            return Err(Error::AlreadyExists {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name,
            });
        }

        let mut stored = object.clone();
        if let Some(metadata) = stored.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));
        }
        objects.insert(key, stored.clone());
        self.creates.lock().push(format!("{kind}/{name}"));
        Ok(stored)
    }

    fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<()> {
        self.injected_failure()?;
        self.objects
            .lock()
            .remove(&(kind, namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    fn list(&self, kind: ResourceKind, namespace: &str, selector: &Labels) -> Result<Vec<Value>> {
        self.injected_failure()?;
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|((k, ns, _), object)| {
                *k == kind && ns == namespace && matches_selector(&labels_of(object), selector)
            })
            .map(|(_, object)| object.clone())
            .collect())
    }
}
