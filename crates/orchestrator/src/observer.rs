//! Run observer trait
//!
//! Lets a caller follow a run (progress output, audit logs) without the
//! engine depending on any particular UI.

use crate::report::DependencyReport;
use crate::types::{NodeState, RunReport};

/// Progress callback for a run
///
/// All methods are invoked on the scheduler thread, in the order the
/// scheduler applies the corresponding events.
pub trait RunObserver: Send {
    /// Called once before any node is dispatched
    fn on_run_start(&mut self, nodes: usize);

    /// Called whenever a node's lifecycle state changes
    fn on_state_change(&mut self, key: &str, from: NodeState, to: NodeState);

    /// Called when a freshly computed report differs from the previous one
    /// for the edge `dependent -> dependency`
    fn on_report(&mut self, dependent: &str, report: &DependencyReport);

    /// Called when a pending node is blocked for the rest of the run
    fn on_blocked(&mut self, key: &str, reason: &str);

    /// Called once with the final report
    fn on_run_complete(&mut self, report: &RunReport);
}

/// No-op observer
pub struct NoObserver;

impl RunObserver for NoObserver {
    fn on_run_start(&mut self, _nodes: usize) {}
    fn on_state_change(&mut self, _key: &str, _from: NodeState, _to: NodeState) {}
    fn on_report(&mut self, _dependent: &str, _report: &DependencyReport) {}
    fn on_blocked(&mut self, _key: &str, _reason: &str) {}
    fn on_run_complete(&mut self, _report: &RunReport) {}
}
