//! Per-pass status memo
//!
//! A pass is one evaluation round for a node: its readiness poll plus
//! the report computations for its outgoing edges. Within a pass a
//! cacheable node is queried once; the next pass always queries again.
//! Adapters that declare themselves non-cacheable bypass the memo.

use crate::error::Result;
use crate::graph::{Graph, Node};
use crate::types::ResourceStatus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of an evaluation pass
pub type Pass = u64;

#[derive(Debug, Clone, Copy)]
struct Cached {
    pass: Pass,
    status: ResourceStatus,
}

/// Status cache with one slot per node
///
/// Slots are locked independently, so unrelated nodes never contend.
#[derive(Debug, Default)]
pub struct StatusCache {
    slots: HashMap<String, Mutex<Option<Cached>>>,
    next_pass: AtomicU64,
    queries: AtomicU64,
    hits: AtomicU64,
}

impl StatusCache {
    /// Create a cache with a slot for every node of `graph`
    pub fn for_graph(graph: &Graph) -> Self {
        Self {
            slots: graph
                .nodes()
                .iter()
                .map(|n| (n.key().to_string(), Mutex::new(None)))
                .collect(),
            ..Self::default()
        }
    }

    /// Start a new pass; results cached in earlier passes become stale
    pub fn begin_pass(&self) -> Pass {
        self.next_pass.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Cached-or-fresh status of `node` for `pass`
    ///
    /// Errors are never cached.
    pub fn get(&self, node: &Node, pass: Pass) -> Result<ResourceStatus> {
        let resource = node.resource();
        let slot = self.slots.get(node.key());

        let Some(slot) = slot.filter(|_| resource.status_is_cacheable(node.meta())) else {
            self.queries.fetch_add(1, Ordering::Relaxed);
            return resource.status(node.meta());
        };

        let mut cached = slot.lock();
        if let Some(entry) = *cached
            && entry.pass == pass
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("status cache hit for {} in pass {}", node.key(), pass);
            return Ok(entry.status);
        }

        self.queries.fetch_add(1, Ordering::Relaxed);
        let status = resource.status(node.meta())?;
        *cached = Some(Cached { pass, status });
        Ok(status)
    }

    /// Number of status queries issued to adapters
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Number of lookups answered from the memo
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::graph::Declaration;
    use crate::resource::{LiveObject, Resource};
    use crate::types::{CreateOutcome, Meta};
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    #[derive(Debug)]
    struct Counting {
        key: String,
        cacheable: bool,
        fail: bool,
        calls: AtomicU32,
    }

    impl Counting {
        fn new(key: &str, cacheable: bool) -> Arc<Self> {
            Arc::new(Self {
                key: key.to_string(),
                cacheable,
                fail: false,
                calls: AtomicU32::new(0),
            })
        }
    }

    impl Resource for Counting {
        fn key(&self) -> String {
            self.key.clone()
        }
        fn kind(&self) -> &'static str {
            "counting"
        }
        fn lookup(&self) -> Result<Option<LiveObject>> {
            Ok(None)
        }
        fn equal_to_declaration(&self, _live: &LiveObject) -> bool {
            true
        }
        fn create(&self) -> Result<CreateOutcome> {
            Ok(CreateOutcome::Created)
        }
        fn delete(&self) -> Result<()> {
            Ok(())
        }
        fn status(&self, _meta: &Meta) -> Result<ResourceStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::transient(&self.key, "unreachable"));
            }
            Ok(ResourceStatus::Ready)
        }
        fn status_is_cacheable(&self, _meta: &Meta) -> bool {
            self.cacheable
        }
    }

    fn graph_of(resources: Vec<Arc<Counting>>) -> Graph {
        Graph::build(
            resources
                .into_iter()
                .map(|r| Declaration::new(r as Arc<dyn Resource>))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_cacheable_status_reused_within_pass() {
        let resource = Counting::new("a", true);
        let graph = graph_of(vec![resource.clone()]);
        let cache = StatusCache::for_graph(&graph);

        let pass = cache.begin_pass();
        for _ in 0..3 {
            assert_eq!(cache.get(graph.node(0), pass).unwrap(), ResourceStatus::Ready);
        }

        assert_eq!(resource.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 2);
    }

    #[test]
    fn test_cacheable_status_refreshed_next_pass() {
        let resource = Counting::new("a", true);
        let graph = graph_of(vec![resource.clone()]);
        let cache = StatusCache::for_graph(&graph);

        let first = cache.begin_pass();
        cache.get(graph.node(0), first).unwrap();
        let second = cache.begin_pass();
        cache.get(graph.node(0), second).unwrap();

        assert!(second > first);
        assert_eq!(resource.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_cacheable_always_queried() {
        let resource = Counting::new("service/web", false);
        let graph = graph_of(vec![resource.clone()]);
        let cache = StatusCache::for_graph(&graph);

        let pass = cache.begin_pass();
        for _ in 0..3 {
            cache.get(graph.node(0), pass).unwrap();
        }

        assert_eq!(resource.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.queries(), 3);
    }

    #[test]
    fn test_errors_not_cached() {
        let resource = Arc::new(Counting {
            key: "a".into(),
            cacheable: true,
            fail: true,
            calls: AtomicU32::new(0),
        });
        let graph = graph_of(vec![resource.clone()]);
        let cache = StatusCache::for_graph(&graph);

        let pass = cache.begin_pass();
        assert!(cache.get(graph.node(0), pass).is_err());
        assert!(cache.get(graph.node(0), pass).is_err());
        assert_eq!(resource.calls.load(Ordering::SeqCst), 2);
    }
}
