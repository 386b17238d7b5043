//! HTTP backend for a Kubernetes-style API server.
//!
//! Works against `kubectl proxy` out of the box (no auth) or directly
//! against an API server with a bearer token.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Labels, ResourceKind, name_of, selector_query};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Connection settings for [`HttpBackend`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// API base URL, e.g. `http://127.0.0.1:8001`
    pub server: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Timeout for a whole request
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:8001".to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Cluster API backend over blocking HTTP.
///
/// # Example
///
/// ```no_run
/// use cluster::backend::Backend;
/// use cluster::backend::http::{HttpBackend, HttpConfig};
/// use cluster::ResourceKind;
///
/// let backend = HttpBackend::new(HttpConfig::default());
/// let live = backend.get(ResourceKind::Deployment, "default", "web").unwrap();
/// println!("exists: {}", live.is_some());
/// ```
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API base URL without trailing slash.
    server: String,
    token: Option<String>,
}

impl HttpBackend {
    /// Create a backend from connection settings.
    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            server: config.server.trim_end_matches('/').to_string(),
            token: config.token,
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let request = request
            .header("Accept", "application/json")
            .header("User-Agent", "appflow");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }
}

impl Backend for HttpBackend {
    fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Option<Value>> {
        let url = self.url(&kind.object_path(namespace, name));
        log::trace!("GET {url}");

        match self.authorize(self.agent.get(&url)).call() {
            Ok(mut response) => Ok(Some(response.body_mut().read_json()?)),
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self, kind: ResourceKind, namespace: &str, object: &Value) -> Result<Value> {
        let name = name_of(object)?;
        let url = self.url(&kind.collection_path(namespace));
        log::trace!("POST {url} ({name})");

        match self.authorize(self.agent.post(&url)).send_json(object) {
            Ok(mut response) => Ok(response.body_mut().read_json()?),
            Err(ureq::Error::StatusCode(409)) => Err(Error::AlreadyExists {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<()> {
        let url = self.url(&kind.object_path(namespace, name));
        log::trace!("DELETE {url}");

        match self
            .authorize(self.agent.delete(&url))
            .query("propagationPolicy", "Foreground")
            .call()
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(404)) => Err(Error::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, kind: ResourceKind, namespace: &str, selector: &Labels) -> Result<Vec<Value>> {
        let url = self.url(&kind.collection_path(namespace));
        let query = selector_query(selector);
        log::trace!("GET {url}?labelSelector={query}");

        let list: ObjectList = self
            .authorize(self.agent.get(&url))
            .query("labelSelector", &query)
            .call()?
            .body_mut()
            .read_json()?;

        Ok(list.items)
    }
}

// =============================================================================
// API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<Value>,
}
