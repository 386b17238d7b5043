//! Read-only status snapshot of a graph
//!
//! Queries every node once and evaluates every edge without creating
//! anything. All queries share one cache pass.

use crate::cache::StatusCache;
use crate::graph::Graph;
use crate::report::{self, DependencyReport};
use crate::types::ResourceStatus;
use rayon::prelude::*;
use serde::Serialize;

/// Observed state of one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub key: String,
    pub kind: String,
    pub existing: bool,
    /// `None` when the status query failed
    pub status: Option<ResourceStatus>,
    pub error: Option<String>,
    /// Reports of the edges this node depends on
    pub dependencies: Vec<DependencyReport>,
}

impl NodeSnapshot {
    /// Whether every dependency currently lets this node proceed
    pub fn is_unblocked(&self) -> bool {
        self.dependencies.iter().all(DependencyReport::unblocks)
    }
}

/// Observed state of a graph, in declaration order
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

impl StatusSnapshot {
    pub fn is_all_ready(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| n.status == Some(ResourceStatus::Ready))
    }

    pub fn get(&self, key: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.key == key)
    }
}

/// Take a snapshot of every node and edge
pub fn snapshot(graph: &Graph) -> StatusSnapshot {
    let cache = StatusCache::for_graph(graph);
    let pass = cache.begin_pass();

    let nodes = (0..graph.len())
        .into_par_iter()
        .map(|index| {
            let node = graph.node(index);
            let (status, error) = match cache.get(node, pass) {
                Ok(status) => (Some(status), None),
                Err(e) => (None, Some(e.to_string())),
            };
            let dependencies = graph
                .incoming(index)
                .iter()
                .map(|&id| {
                    let edge = graph.edge(id);
                    report::evaluate(graph.node(edge.dependency), &edge.meta, &cache, pass)
                })
                .collect();
            NodeSnapshot {
                key: node.key().to_string(),
                kind: node.resource().kind().to_string(),
                existing: node.is_existing(),
                status,
                error,
                dependencies,
            }
        })
        .collect();

    log::debug!(
        "snapshot issued {} status queries ({} cache hits)",
        cache.queries(),
        cache.hits()
    );
    StatusSnapshot { nodes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::graph::Declaration;
    use crate::resource::{LiveObject, Resource};
    use crate::types::{CreateOutcome, Meta};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Fixed {
        key: &'static str,
        status: Option<ResourceStatus>,
        calls: AtomicU32,
    }

    impl Fixed {
        fn new(key: &'static str, status: Option<ResourceStatus>) -> Arc<Self> {
            Arc::new(Self {
                key,
                status,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl Resource for Fixed {
        fn key(&self) -> String {
            self.key.to_string()
        }
        fn kind(&self) -> &'static str {
            "fixed"
        }
        fn lookup(&self) -> Result<Option<LiveObject>> {
            Ok(None)
        }
        fn equal_to_declaration(&self, _live: &LiveObject) -> bool {
            true
        }
        fn create(&self) -> Result<CreateOutcome> {
            panic!("snapshot must not create");
        }
        fn delete(&self) -> Result<()> {
            panic!("snapshot must not delete");
        }
        fn status(&self, _meta: &Meta) -> Result<ResourceStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.status
                .ok_or_else(|| Error::adapter(self.key, "not found"))
        }
    }

    #[test]
    fn test_snapshot_reports_status_and_edges() {
        let db = Fixed::new("db", Some(ResourceStatus::NotReady));
        let graph = Graph::build(vec![
            Declaration::new(db.clone()),
            Declaration::new(Fixed::new("web", None)).depends_on("db"),
        ])
        .unwrap();

        let snapshot = snapshot(&graph);

        let web = snapshot.get("web").unwrap();
        assert_eq!(web.status, None);
        assert_eq!(web.error.as_deref(), Some("web: not found"));
        assert_eq!(web.dependencies.len(), 1);
        assert!(web.dependencies[0].blocks);
        assert!(!web.is_unblocked());
        assert!(!snapshot.is_all_ready());

        // Own status and edge evaluation share one pass
        assert_eq!(db.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_all_ready() {
        let graph = Graph::build(vec![
            Declaration::new(Fixed::new("a", Some(ResourceStatus::Ready))),
            Declaration::new(Fixed::new("b", Some(ResourceStatus::Ready))).depends_on("a"),
        ])
        .unwrap();

        let snapshot = snapshot(&graph);
        assert!(snapshot.is_all_ready());
        assert!(snapshot.get("b").unwrap().is_unblocked());
    }
}
