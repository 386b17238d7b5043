//! Declaration file loader
//!
//! Reads a YAML (or JSON) file listing cluster objects and their
//! dependencies and turns it into engine declarations:
//!
//! ```yaml
//! resources:
//!   - kind: ConfigMap
//!     metadata: {name: settings}
//!     data: {mode: fast}
//!   - existing: true
//!     kind: Secret
//!     metadata: {name: token}
//!   - kind: Deployment
//!     metadata: {name: web}
//!     depends_on: [configmap/settings, secret/token]
//!     spec: {...}
//! dependencies:
//!   - parent: deployment/web
//!     child: service/web
//!     meta: {success_factor: 50}
//! ```

use anyhow::{Context, Result, bail};
use cluster::{Client, Labels, ResourceKind, string_map};
use orchestrator::{Declaration, Meta, SharedResource};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::resource::kinds::template_labels;
use crate::resource::{ExistingResource, ManagedResource, Target};

#[derive(Debug, Deserialize)]
struct DeclarationFile {
    #[serde(default)]
    resources: Vec<ResourceEntry>,
    #[serde(default)]
    dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    /// Managed outside this tool; only `kind` and `metadata.name` matter
    #[serde(default)]
    existing: bool,
    #[serde(default)]
    meta: Map<String, Value>,
    #[serde(default)]
    depends_on: Vec<String>,
    /// Everything else is the manifest sent to the cluster
    #[serde(flatten)]
    manifest: Map<String, Value>,
}

/// `child` depends on `parent`
#[derive(Debug, Deserialize)]
struct DependencyEntry {
    parent: String,
    child: String,
    #[serde(default)]
    meta: Map<String, Value>,
}

/// Load declarations from a file
pub fn load_file(path: &Path, client: &Client) -> Result<Vec<Declaration>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    parse(&content, client).with_context(|| format!("Invalid declaration file {}", path.display()))
}

/// Parse declarations from YAML or JSON text
pub fn parse(content: &str, client: &Client) -> Result<Vec<Declaration>> {
    let file: DeclarationFile = serde_yaml::from_str(content).context("Invalid YAML")?;

    let mut declarations = file
        .resources
        .into_iter()
        .enumerate()
        .map(|(i, entry)| declaration(entry, client).with_context(|| format!("resource #{}", i + 1)))
        .collect::<Result<Vec<_>>>()?;

    for dependency in file.dependencies {
        let child = normalize_key(&dependency.child);
        let Some(declaration) = declarations.iter_mut().find(|d| d.key == child) else {
            bail!("dependency on {} names undeclared resource {child}", dependency.parent);
        };
        let parent = normalize_key(&dependency.parent);
        declaration.depends_on.push(orchestrator::DependencySpec {
            key: parent,
            meta: meta_of(dependency.meta),
        });
    }

    log::debug!("loaded {} declarations", declarations.len());
    Ok(declarations)
}

fn declaration(entry: ResourceEntry, client: &Client) -> Result<Declaration> {
    let mut manifest = entry.manifest;
    let kind: ResourceKind = manifest
        .get("kind")
        .and_then(Value::as_str)
        .context("missing kind")?
        .parse()?;
    let name = manifest
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .context("missing metadata.name")?
        .to_string();

    let mut target = Target::new(kind, name);
    if let Some(namespace) = manifest
        .get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(Value::as_str)
    {
        target = target.in_namespace(namespace);
    }

    manifest.insert("kind".to_string(), Value::from(kind.api_kind()));
    manifest
        .entry("apiVersion")
        .or_insert_with(|| Value::from(kind.api_version()));
    let manifest = Value::Object(manifest);
    let (labels, selector) = matching_labels(kind, &manifest);

    let resource: SharedResource = if entry.existing {
        Arc::new(ExistingResource::new(target, client.clone()))
    } else {
        Arc::new(ManagedResource::new(target, manifest, client.clone()))
    };

    let mut declaration = Declaration::new(resource)
        .with_meta(meta_of(entry.meta))
        .with_labels(labels)
        .with_selector(selector);
    for key in &entry.depends_on {
        declaration = declaration.depends_on(normalize_key(key));
    }
    Ok(declaration)
}

/// Labels carried by the objects a declaration produces, and the
/// selector it uses to pick other objects
fn matching_labels(kind: ResourceKind, manifest: &Value) -> (Labels, Labels) {
    match kind {
        ResourceKind::Deployment | ResourceKind::ReplicaSet | ResourceKind::StatefulSet => {
            (template_labels(manifest), Labels::new())
        }
        ResourceKind::Pod | ResourceKind::Job => {
            (string_map(manifest.pointer("/metadata/labels")), Labels::new())
        }
        ResourceKind::Service => (Labels::new(), string_map(manifest.pointer("/spec/selector"))),
        _ => (Labels::new(), Labels::new()),
    }
}

/// Scalar meta values are kept as strings (`50` and `"50"` are the same)
fn meta_of(meta: Map<String, Value>) -> Meta {
    string_map(Some(&Value::Object(meta)))
}

/// `Deployment/web` and `deployments/web` both become `deployment/web`
pub fn normalize_key(key: &str) -> String {
    let key = key.trim();
    match key.split_once('/') {
        Some((kind, name)) => match kind.parse::<ResourceKind>() {
            Ok(kind) => format!("{}/{}", kind.name(), name.trim()),
            Err(_) => key.to_string(),
        },
        None => key.to_string(),
    }
}
