//! Dependency graph - nodes, "depends on" edges, validation
//!
//! The graph is built once per run from an ordered list of declarations
//! and is read-only afterwards, apart from each node's lifecycle fields
//! which sit behind per-node locks.

use crate::error::{Error, Result};
use crate::report::DependencyReport;
use crate::resource::SharedResource;
use crate::types::{Meta, NodeState};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Labels or a label selector
pub type Labels = BTreeMap<String, String>;

/// An explicit dependency on another declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Key of the declaration depended upon
    pub key: String,
    /// Edge configuration (e.g. `success_factor`)
    pub meta: Meta,
}

/// One declared resource, as handed over by the declaration loader
#[derive(Debug, Clone)]
pub struct Declaration {
    pub key: String,
    pub resource: SharedResource,
    /// Node configuration passed to `status`
    pub meta: Meta,
    pub depends_on: Vec<DependencySpec>,
    /// Labels carried by the objects this declaration produces
    pub labels: Labels,
    /// Selector this declaration uses to pick other objects
    pub selector: Labels,
}

impl Declaration {
    /// Create a declaration keyed by the resource's own key
    pub fn new(resource: SharedResource) -> Self {
        Self {
            key: resource.key(),
            resource,
            meta: Meta::new(),
            depends_on: Vec::new(),
            labels: Labels::new(),
            selector: Labels::new(),
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// Add an explicit dependency with default (full readiness) configuration
    pub fn depends_on(self, key: impl Into<String>) -> Self {
        self.depends_on_with(key, Meta::new())
    }

    /// Add an explicit dependency with edge configuration
    pub fn depends_on_with(mut self, key: impl Into<String>, meta: Meta) -> Self {
        self.depends_on.push(DependencySpec {
            key: key.into(),
            meta,
        });
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_selector(mut self, selector: Labels) -> Self {
        self.selector = selector;
        self
    }
}

/// A dependency inferred from labels and selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyLink {
    pub dependent: String,
    pub dependency: String,
}

/// Infer dependencies from matching labels and selectors
///
/// A declaration with a non-empty selector depends on every other
/// declaration whose labels contain all selector pairs. Output follows
/// declaration order.
pub fn infer_dependencies(declarations: &[Declaration]) -> Vec<DependencyLink> {
    let mut links = Vec::new();
    for selecting in declarations.iter().filter(|d| !d.selector.is_empty()) {
        for candidate in declarations {
            if candidate.key == selecting.key || candidate.labels.is_empty() {
                continue;
            }
            let matches = selecting
                .selector
                .iter()
                .all(|(k, v)| candidate.labels.get(k) == Some(v));
            if matches {
                links.push(DependencyLink {
                    dependent: selecting.key.clone(),
                    dependency: candidate.key.clone(),
                });
            }
        }
    }
    links
}

/// One resource tracked by the graph
pub struct Node {
    key: String,
    resource: SharedResource,
    meta: Meta,
    state: Mutex<NodeState>,
    blocked_by: Mutex<Option<String>>,
    reports: Mutex<BTreeMap<String, DependencyReport>>,
}

impl Node {
    fn new(declaration: Declaration) -> Self {
        Self {
            key: declaration.key,
            resource: declaration.resource,
            meta: declaration.meta,
            state: Mutex::new(NodeState::Pending),
            blocked_by: Mutex::new(None),
            reports: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn resource(&self) -> &SharedResource {
        &self.resource
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn is_existing(&self) -> bool {
        self.resource.is_existing()
    }

    /// Current lifecycle state
    pub fn state(&self) -> NodeState {
        *self.state.lock()
    }

    /// Why a pending node can never be unblocked in this run
    pub fn blocked_by(&self) -> Option<String> {
        self.blocked_by.lock().clone()
    }

    /// Last report computed for each outgoing edge, keyed by dependent
    pub fn reports(&self) -> BTreeMap<String, DependencyReport> {
        self.reports.lock().clone()
    }

    /// Last report computed for the edge towards `dependent`
    pub fn report_for(&self, dependent: &str) -> Option<DependencyReport> {
        self.reports.lock().get(dependent).cloned()
    }

    /// Pending and still eligible for dispatch
    pub fn is_schedulable(&self) -> bool {
        self.state() == NodeState::Pending && self.blocked_by.lock().is_none()
    }

    pub(crate) fn set_state(&self, state: NodeState) -> NodeState {
        std::mem::replace(&mut *self.state.lock(), state)
    }

    /// Move `Pending -> Creating`; false when the node was already taken
    pub(crate) fn claim(&self) -> bool {
        let mut state = self.state.lock();
        if *state != NodeState::Pending || self.blocked_by.lock().is_some() {
            return false;
        }
        *state = NodeState::Creating;
        true
    }

    /// Record a permanent block; first reason wins
    pub(crate) fn block(&self, reason: String) -> bool {
        let mut blocked = self.blocked_by.lock();
        if blocked.is_some() {
            return false;
        }
        *blocked = Some(reason);
        true
    }

    /// Store the latest report for `dependent`; true when it changed
    pub(crate) fn record_report(&self, dependent: &str, report: DependencyReport) -> bool {
        let mut reports = self.reports.lock();
        if reports.get(dependent) == Some(&report) {
            return false;
        }
        reports.insert(dependent.to_string(), report);
        true
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// `dependent` depends on `dependency`
#[derive(Debug, Clone)]
pub struct Edge {
    pub dependent: usize,
    pub dependency: usize,
    /// How much readiness of `dependency` unblocks `dependent`
    pub meta: Meta,
}

/// Validated, acyclic dependency graph
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    /// Edge ids per node where the node is the dependent
    incoming: Vec<Vec<usize>>,
    /// Edge ids per node where the node is the dependency
    outgoing: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl Graph {
    /// Build from explicit dependencies only
    pub fn build(declarations: Vec<Declaration>) -> Result<Self> {
        Self::build_with_links(declarations, Vec::new())
    }

    /// Build from explicit dependencies plus those inferred from labels
    pub fn build_inferred(declarations: Vec<Declaration>) -> Result<Self> {
        let links = infer_dependencies(&declarations);
        Self::build_with_links(declarations, links)
    }

    fn build_with_links(declarations: Vec<Declaration>, links: Vec<DependencyLink>) -> Result<Self> {
        let mut index = HashMap::with_capacity(declarations.len());
        for (i, declaration) in declarations.iter().enumerate() {
            if index.insert(declaration.key.clone(), i).is_some() {
                return Err(Error::DuplicateResource {
                    key: declaration.key.clone(),
                });
            }
        }

        let lookup = |from: &str, to: &str| -> Result<usize> {
            index.get(to).copied().ok_or_else(|| Error::UnknownDependency {
                from: from.to_string(),
                to: to.to_string(),
            })
        };

        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        for (dependent, declaration) in declarations.iter().enumerate() {
            for spec in &declaration.depends_on {
                let dependency = lookup(&declaration.key, &spec.key)?;
                if seen.insert((dependent, dependency)) {
                    edges.push(Edge {
                        dependent,
                        dependency,
                        meta: spec.meta.clone(),
                    });
                }
            }
        }
        for link in &links {
            let (Some(&dependent), Some(&dependency)) =
                (index.get(&link.dependent), index.get(&link.dependency))
            else {
                continue;
            };
            if seen.insert((dependent, dependency)) {
                edges.push(Edge {
                    dependent,
                    dependency,
                    meta: Meta::new(),
                });
            }
        }

        let mut incoming = vec![Vec::new(); declarations.len()];
        let mut outgoing = vec![Vec::new(); declarations.len()];
        for (id, edge) in edges.iter().enumerate() {
            incoming[edge.dependent].push(id);
            outgoing[edge.dependency].push(id);
        }

        let keys: Vec<&str> = declarations.iter().map(|d| d.key.as_str()).collect();
        let order = topological_sort(&keys, &edges, &incoming)?;

        log::debug!(
            "built graph with {} nodes and {} edges",
            declarations.len(),
            edges.len()
        );

        Ok(Self {
            nodes: declarations.into_iter().map(Node::new).collect(),
            edges,
            index,
            incoming,
            outgoing,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.index_of(key).map(|i| &self.nodes[i])
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: usize) -> &Edge {
        &self.edges[id]
    }

    /// Edge ids on which `index` depends
    pub fn incoming(&self, index: usize) -> &[usize] {
        &self.incoming[index]
    }

    /// Edge ids of nodes depending on `index`
    pub fn outgoing(&self, index: usize) -> &[usize] {
        &self.outgoing[index]
    }

    /// Keys `key` depends on
    pub fn dependencies_of(&self, key: &str) -> Vec<&str> {
        self.index_of(key)
            .map(|i| {
                self.incoming[i]
                    .iter()
                    .map(|&e| self.nodes[self.edges[e].dependency].key())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Keys depending on `key`
    pub fn dependents_of(&self, key: &str) -> Vec<&str> {
        self.index_of(key)
            .map(|i| {
                self.outgoing[i]
                    .iter()
                    .map(|&e| self.nodes[self.edges[e].dependent].key())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Node indices with dependencies before dependents
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Keys with dependencies before dependents
    pub fn ordered_keys(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.nodes[i].key()).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first post-order over "depends on" edges
///
/// Roots are visited in declaration order and dependencies in edge order,
/// so both the order and any reported cycle are deterministic.
fn topological_sort(keys: &[&str], edges: &[Edge], incoming: &[Vec<usize>]) -> Result<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; keys.len()];
    let mut order = Vec::with_capacity(keys.len());

    for root in 0..keys.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::InProgress;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let Some(&edge) = incoming[node].get(frame.1) else {
                marks[node] = Mark::Done;
                order.push(node);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            let dependency = edges[edge].dependency;
            match marks[dependency] {
                Mark::Unvisited => {
                    marks[dependency] = Mark::InProgress;
                    stack.push((dependency, 0));
                }
                Mark::InProgress => {
                    let start = stack
                        .iter()
                        .position(|&(n, _)| n == dependency)
                        .unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|&(n, _)| keys[n].to_string()).collect();
                    path.push(keys[dependency].to_string());
                    return Err(Error::Cycle { path });
                }
                Mark::Done => {}
            }
        }
    }

    Ok(order)
}
