//! Execution engine - drives a graph from `Pending` to terminal states
//!
//! The calling thread runs the scheduler; every unblocked node is handed
//! to a worker on a rayon pool which owns its create-then-poll sequence.
//! Workers never touch lifecycle state themselves. They send events over
//! a channel and the scheduler applies them in arrival order, recording
//! reports and dispatching dependents once every incoming edge unblocks.

use crate::cache::{Pass, StatusCache};
use crate::error::{Error, Result};
use crate::graph::{Graph, Node};
use crate::observer::{NoObserver, RunObserver};
use crate::report::{self, DependencyReport};
use crate::retry::{LogCallback, with_retry};
use crate::types::{CreateOutcome, ExecuteOptions, NodeOutcome, NodeState, ResourceStatus, RunReport};
use rayon::Scope;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// Message from a worker to the scheduler
#[derive(Debug)]
enum Event {
    /// Creation phase finished
    Created { node: usize, outcome: CreateOutcome },
    /// Non-terminal state change while polling
    Progress { node: usize, state: NodeState },
    /// Fresh reports for outgoing edges, keyed by edge id
    Reports {
        reports: Vec<(usize, DependencyReport)>,
    },
    /// Worker is done with the node
    Finished {
        node: usize,
        state: NodeState,
        message: Option<String>,
    },
}

/// Execute a graph with the given options and observer
///
/// Blocks until every dispatched node reached a terminal state. Nodes
/// whose dependencies failed, drifted or can never be satisfied stay
/// `Pending`; the returned report says why.
///
/// # Errors
/// Only fails when the worker pool cannot be created; per-node failures
/// are part of the report.
pub fn execute<O: RunObserver>(graph: &Graph, opts: &ExecuteOptions, observer: &mut O) -> Result<RunReport> {
    let width = opts.jobs.unwrap_or(graph.len()).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(width)
        .thread_name(|i| format!("appflow-worker-{i}"))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    log::info!("running {} resources with {} workers", graph.len(), width);

    let cache = StatusCache::for_graph(graph);
    let (events, inbox) = mpsc::channel();
    let mut scheduler = Scheduler {
        graph,
        cache: &cache,
        opts,
        observer,
        events,
        inbox,
        created: vec![false; graph.len()],
        messages: vec![None; graph.len()],
        in_flight: 0,
    };

    scheduler.observer.on_run_start(graph.len());
    pool.in_place_scope(|scope| scheduler.run(scope));

    let report = scheduler.finish();
    log::info!(
        "run finished: {} ready, {} failed, {} drifted, {} blocked ({} status queries, {} cache hits)",
        report.nodes.iter().filter(|n| n.state == NodeState::Ready).count(),
        report.failed().len(),
        report.drifted().len(),
        report.blocked().len(),
        cache.queries(),
        cache.hits()
    );
    scheduler.observer.on_run_complete(&report);
    Ok(report)
}

/// Execution without an observer
pub fn execute_simple(graph: &Graph, opts: &ExecuteOptions) -> Result<RunReport> {
    execute(graph, opts, &mut NoObserver)
}

struct Scheduler<'a, O: RunObserver> {
    graph: &'a Graph,
    cache: &'a StatusCache,
    opts: &'a ExecuteOptions,
    observer: &'a mut O,
    events: Sender<Event>,
    inbox: Receiver<Event>,
    created: Vec<bool>,
    messages: Vec<Option<String>>,
    in_flight: usize,
}

impl<'a, O: RunObserver> Scheduler<'a, O> {
    fn run<'s>(&mut self, scope: &Scope<'s>)
    where
        'a: 's,
    {
        for index in 0..self.graph.len() {
            if self.graph.incoming(index).is_empty() {
                self.try_dispatch(scope, index);
            }
        }

        while self.in_flight > 0 {
            let Ok(event) = self.inbox.recv() else {
                break;
            };
            self.handle(scope, event);
        }
    }

    fn handle<'s>(&mut self, scope: &Scope<'s>, event: Event)
    where
        'a: 's,
    {
        let graph = self.graph;
        match event {
            Event::Created { node, outcome } => {
                let key = graph.node(node).key();
                match outcome {
                    CreateOutcome::Created => {
                        self.created[node] = true;
                        log::info!("created {key}");
                    }
                    CreateOutcome::AlreadyExists => log::info!("{key} already exists, create skipped"),
                    CreateOutcome::Found => log::info!("found pre-existing {key}"),
                    CreateOutcome::Drifted => log::warn!("{key} differs from its declaration"),
                }
                if outcome != CreateOutcome::Drifted {
                    self.transition(node, NodeState::Polling);
                }
            }
            Event::Progress { node, state } => {
                if graph.node(node).state().is_active() {
                    self.transition(node, state);
                }
            }
            Event::Reports { reports } => {
                for (edge, report) in reports {
                    self.apply_report(scope, edge, report);
                }
            }
            Event::Finished { node, state, message } => {
                self.in_flight -= 1;
                self.transition(node, state);
                let key = graph.node(node).key();
                if state.is_failure() {
                    let detail = message.as_deref().unwrap_or("no detail");
                    log::warn!("{key} ended {state}: {detail}");
                    let dependents = self.dependents(node);
                    self.block_subtree(dependents, &format!("dependency {key} {state}: {detail}"));
                } else {
                    log::info!("{key} is {state}");
                    if state == NodeState::Ready {
                        self.block_unsatisfied(node);
                    }
                }
                self.messages[node] = message;
            }
        }
    }

    fn apply_report<'s>(&mut self, scope: &Scope<'s>, edge: usize, report: DependencyReport)
    where
        'a: 's,
    {
        let graph = self.graph;
        let edge = graph.edge(edge);
        let dependency = graph.node(edge.dependency);
        let dependent = graph.node(edge.dependent);

        if !dependent.is_schedulable() {
            return;
        }
        let error = report.error.clone();
        let unblocks = report.unblocks();
        if dependency.record_report(dependent.key(), report.clone()) {
            log::debug!("{} -> {}: {}", dependent.key(), dependency.key(), report.message);
            self.observer.on_report(dependent.key(), &report);
        }

        if let Some(error) = error {
            let reason = format!("dependency {} cannot be satisfied: {error}", dependency.key());
            self.block_subtree(vec![edge.dependent], &reason);
        } else if unblocks {
            self.try_dispatch(scope, edge.dependent);
        }
    }

    /// Dispatch `index` if it is pending and every incoming edge unblocks
    fn try_dispatch<'s>(&mut self, scope: &Scope<'s>, index: usize)
    where
        'a: 's,
    {
        let graph = self.graph;
        let node = graph.node(index);
        if !node.is_schedulable() {
            return;
        }
        let unblocked = graph.incoming(index).iter().all(|&e| {
            graph
                .node(graph.edge(e).dependency)
                .report_for(node.key())
                .is_some_and(|r| r.unblocks())
        });
        if !unblocked || !node.claim() {
            return;
        }

        log::debug!("dispatching {}", node.key());
        self.observer
            .on_state_change(node.key(), NodeState::Pending, NodeState::Creating);
        self.in_flight += 1;

        let worker = Worker {
            graph,
            cache: self.cache,
            opts: self.opts,
            events: self.events.clone(),
            index,
        };
        scope.spawn(move |_| worker.run());
    }

    /// Permanently block pending nodes in `roots` and everything below them
    fn block_subtree(&mut self, roots: Vec<usize>, reason: &str) {
        let graph = self.graph;
        let mut stack = roots;
        while let Some(index) = stack.pop() {
            let node = graph.node(index);
            if node.state() != NodeState::Pending || !node.block(reason.to_string()) {
                continue;
            }
            log::warn!("{} blocked: {}", node.key(), reason);
            self.observer.on_blocked(node.key(), reason);
            stack.extend(self.dependents(index));
        }
    }

    /// Block dependents whose edge from a finished node never unblocked
    fn block_unsatisfied(&mut self, index: usize) {
        let graph = self.graph;
        let node = graph.node(index);
        for &e in graph.outgoing(index) {
            let dependent = graph.edge(e).dependent;
            let Some(report) = node
                .report_for(graph.node(dependent).key())
                .filter(|r| !r.unblocks())
            else {
                continue;
            };
            let reason = format!("dependency {} stayed below threshold: {}", node.key(), report.message);
            self.block_subtree(vec![dependent], &reason);
        }
    }

    fn dependents(&self, index: usize) -> Vec<usize> {
        self.graph
            .outgoing(index)
            .iter()
            .map(|&e| self.graph.edge(e).dependent)
            .collect()
    }

    fn transition(&mut self, index: usize, state: NodeState) {
        let graph = self.graph;
        let node = graph.node(index);
        let previous = node.set_state(state);
        if previous != state {
            self.observer.on_state_change(node.key(), previous, state);
        }
    }

    fn finish(&self) -> RunReport {
        let nodes = self
            .graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let state = node.state();
                let blocking_report = if state == NodeState::Pending {
                    self.blocking_report(index, node)
                } else {
                    None
                };
                NodeOutcome {
                    key: node.key().to_string(),
                    kind: node.resource().kind().to_string(),
                    state,
                    existing: node.is_existing(),
                    created: self.created[index],
                    message: self.messages[index].clone().or_else(|| node.blocked_by()),
                    blocking_report,
                }
            })
            .collect();
        RunReport { nodes }
    }

    fn blocking_report(&self, index: usize, node: &Node) -> Option<DependencyReport> {
        self.graph.incoming(index).iter().find_map(|&e| {
            self.graph
                .node(self.graph.edge(e).dependency)
                .report_for(node.key())
                .filter(|r| !r.unblocks())
        })
    }
}

/// Owns the create-then-poll sequence of one node
struct Worker<'a> {
    graph: &'a Graph,
    cache: &'a StatusCache,
    opts: &'a ExecuteOptions,
    events: Sender<Event>,
    index: usize,
}

impl Worker<'_> {
    fn run(self) {
        let node = self.graph.node(self.index);
        // Only effective when the final binary unwinds on panic
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.drive(node)));
        let (state, message) = match result {
            Ok(Ok(state)) => (state, None),
            Ok(Err(e @ Error::Drift { .. })) => (NodeState::Drifted, Some(e.to_string())),
            Ok(Err(e)) => (NodeState::Failed, Some(e.to_string())),
            Err(_) => (NodeState::Failed, Some("worker panicked".to_string())),
        };
        self.send(Event::Finished {
            node: self.index,
            state,
            message,
        });
    }

    fn drive(&self, node: &Node) -> Result<NodeState> {
        let outcome = self.create(node)?;
        self.send(Event::Created {
            node: self.index,
            outcome,
        });
        if outcome == CreateOutcome::Drifted {
            return Err(Error::Drift {
                key: node.key().to_string(),
            });
        }
        self.poll(node)
    }

    /// Existence check, then create only when nothing is there
    fn create(&self, node: &Node) -> Result<CreateOutcome> {
        let resource = node.resource();
        let operation = format!("create {}", node.key());
        let callback = LogCallback {
            operation: &operation,
        };

        // Pre-existing resources verify presence inside `create`
        if node.is_existing() {
            return with_retry(&self.opts.retry, Some(&callback), || resource.create());
        }

        let lookup = format!("lookup {}", node.key());
        let live = with_retry(
            &self.opts.retry,
            Some(&LogCallback { operation: &lookup }),
            || resource.lookup(),
        )?;
        match live {
            Some(live) if resource.equal_to_declaration(&live) => Ok(CreateOutcome::AlreadyExists),
            Some(_) => Ok(CreateOutcome::Drifted),
            None => with_retry(&self.opts.retry, Some(&callback), || resource.create()),
        }
    }

    fn poll(&self, node: &Node) -> Result<NodeState> {
        let key = node.key();
        let attempts = self.opts.poll.max_attempts.max(1);
        let operation = format!("status of {key}");
        let callback = LogCallback {
            operation: &operation,
        };
        let mut current = NodeState::Polling;
        let mut last = ResourceStatus::NotReady;

        for attempt in 0..attempts {
            let pass = self.cache.begin_pass();
            let status = with_retry(&self.opts.retry, Some(&callback), || self.cache.get(node, pass))?;
            log::debug!("{key} is {status} (poll {}/{attempts})", attempt + 1);

            match status {
                ResourceStatus::Error => return Err(Error::adapter(key, "resource reported an error")),
                ResourceStatus::WaitingForUpgrade => {
                    return Err(Error::Drift {
                        key: key.to_string(),
                    });
                }
                ResourceStatus::Ready | ResourceStatus::NotReady => last = status,
            }

            let reports = self.evaluate_edges(node, pass);
            let settled = reports.iter().all(|(_, r)| r.is_settled());
            if !reports.is_empty() {
                self.send(Event::Reports { reports });
            }

            if status == ResourceStatus::Ready {
                if settled {
                    return Ok(NodeState::Ready);
                }
                self.progress(&mut current, NodeState::Blocked);
            } else {
                self.progress(&mut current, NodeState::Polling);
            }

            if attempt + 1 < attempts {
                thread::sleep(self.opts.poll.delay_for_attempt(attempt));
            }
        }

        // Ready is terminal for the node itself; unsatisfied edges only
        // hold back its dependents
        if last == ResourceStatus::Ready {
            log::warn!("{key} is ready but some dependents stayed below their threshold after {attempts} polls");
            return Ok(NodeState::Ready);
        }
        Err(Error::PollTimeout {
            key: key.to_string(),
            attempts,
        })
    }

    /// Reports for outgoing edges whose dependent still waits
    fn evaluate_edges(&self, node: &Node, pass: Pass) -> Vec<(usize, DependencyReport)> {
        self.graph
            .outgoing(self.index)
            .iter()
            .filter_map(|&id| {
                let edge = self.graph.edge(id);
                self.graph
                    .node(edge.dependent)
                    .is_schedulable()
                    .then(|| (id, report::evaluate(node, &edge.meta, self.cache, pass)))
            })
            .collect()
    }

    fn progress(&self, current: &mut NodeState, state: NodeState) {
        if *current != state {
            *current = state;
            self.send(Event::Progress {
                node: self.index,
                state,
            });
        }
    }

    fn send(&self, event: Event) {
        // Only fails once the scheduler is gone, when nobody is listening
        let _ = self.events.send(event);
    }
}
