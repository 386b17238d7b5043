//! Core types for dependency-graph orchestration

use crate::report::DependencyReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Free-form key/value configuration attached to nodes and edges
/// (e.g. `success_factor = "80"`).
pub type Meta = BTreeMap<String, String>;

/// Readiness of a resource as observed in the remote system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// Resource is ready; dependents may be created
    Ready,
    /// Resource exists but is still converging
    NotReady,
    /// Resource reported a failure
    Error,
    /// Live object differs from its declaration and needs operator action
    WaitingForUpgrade,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::NotReady => "not ready",
            Self::Error => "error",
            Self::WaitingForUpgrade => "waiting for upgrade",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a node within one run
///
/// `Pending -> Creating -> Polling -> {Ready | Blocked | Failed | Drifted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Waiting for dependencies
    Pending,
    /// Existence check / create call in flight
    Creating,
    /// Polling readiness
    Polling,
    /// Own resource ready, but a dependent's edge still needs more readiness
    Blocked,
    /// Terminal: ready
    Ready,
    /// Terminal: error, missing pre-existing object, or polling exhausted
    Failed,
    /// Terminal: live object differs from declaration
    Drifted,
}

impl NodeState {
    /// Whether the node can no longer change state in this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Drifted)
    }

    /// Whether the node ended in a state that fails the run
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Drifted)
    }

    /// Whether a worker currently owns the node
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Creating | Self::Polling | Self::Blocked)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Creating => "creating",
            Self::Polling => "polling",
            Self::Blocked => "blocked",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Drifted => "waiting for upgrade",
        };
        f.write_str(s)
    }
}

/// Result of an idempotent create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateOutcome {
    /// A create call was issued and accepted
    Created,
    /// An equivalent object already existed; nothing was mutated
    AlreadyExists,
    /// Pre-existing resource confirmed present
    Found,
    /// An object exists but differs from the declaration; left untouched
    Drifted,
}

/// Retry configuration with exponential backoff
///
/// Used both for transient query failures and for the delay between
/// readiness polls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Base delay between attempts
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Default polling cadence: many attempts, gently increasing delay.
    pub fn polling() -> Self {
        Self {
            max_attempts: 300,
            base_delay: Duration::from_secs(1),
            backoff_factor: 1.5,
            max_delay: Duration::from_secs(15),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Options for a run
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Worker pool width; `None` gives every node its own worker
    pub jobs: Option<usize>,
    /// Retry policy for transient query/create failures
    pub retry: RetryConfig,
    /// Polling cadence and budget
    pub poll: RetryConfig,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: None,
            retry: RetryConfig::default(),
            poll: RetryConfig::polling(),
        }
    }
}

/// Final state of one node after a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub key: String,
    pub kind: String,
    pub state: NodeState,
    /// Declared as pre-existing (never created by the run)
    pub existing: bool,
    /// Whether a create call was issued for this node
    pub created: bool,
    /// Failure message, or the reason a pending node was never unblocked
    pub message: Option<String>,
    /// Last report of an incoming edge that still blocks this node
    pub blocking_report: Option<DependencyReport>,
}

/// Per-node outcome of a run, in declaration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub nodes: Vec<NodeOutcome>,
}

impl RunReport {
    /// Every node reached `Ready`
    pub fn is_success(&self) -> bool {
        self.nodes.iter().all(|n| n.state == NodeState::Ready)
    }

    /// Nodes that ended `Failed`
    pub fn failed(&self) -> Vec<&NodeOutcome> {
        self.by_state(NodeState::Failed)
    }

    /// Nodes that ended `Drifted`
    pub fn drifted(&self) -> Vec<&NodeOutcome> {
        self.by_state(NodeState::Drifted)
    }

    /// Nodes that never left `Pending`
    pub fn blocked(&self) -> Vec<&NodeOutcome> {
        self.by_state(NodeState::Pending)
    }

    /// Number of create calls issued
    pub fn created_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.created).count()
    }

    /// Look up a node outcome by key
    pub fn get(&self, key: &str) -> Option<&NodeOutcome> {
        self.nodes.iter().find(|n| n.key == key)
    }

    fn by_state(&self, state: NodeState) -> Vec<&NodeOutcome> {
        self.nodes.iter().filter(|n| n.state == state).collect()
    }
}

/// Summary of a teardown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeardownSummary {
    /// Keys deleted, in deletion order
    pub removed: Vec<String>,
    /// Keys left alone (pre-existing or already absent)
    pub skipped: Vec<String>,
    /// Keys whose deletion failed, with the error
    pub failed: Vec<(String, String)>,
}

impl TeardownSummary {
    /// No deletion failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_delay() {
        let config = RetryConfig::new(5, Duration::from_secs(1), 2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_config_max_delay() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(3),
            ..RetryConfig::new(5, Duration::from_secs(1), 2.0)
        };

        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(30), Duration::from_secs(3));
    }

    #[test]
    fn test_node_state_terminal() {
        assert!(NodeState::Ready.is_terminal());
        assert!(NodeState::Failed.is_terminal());
        assert!(NodeState::Drifted.is_terminal());
        assert!(!NodeState::Blocked.is_terminal());
        assert!(!NodeState::Pending.is_terminal());
        assert!(NodeState::Drifted.is_failure());
        assert!(!NodeState::Ready.is_failure());
    }

    #[test]
    fn test_run_report_success() {
        let outcome = |key: &str, state| NodeOutcome {
            key: key.to_string(),
            kind: "test".to_string(),
            state,
            existing: false,
            created: true,
            message: None,
            blocking_report: None,
        };

        let mut report = RunReport {
            nodes: vec![outcome("a", NodeState::Ready), outcome("b", NodeState::Ready)],
        };
        assert!(report.is_success());
        assert_eq!(report.created_count(), 2);

        report.nodes.push(outcome("c", NodeState::Pending));
        assert!(!report.is_success());
        assert_eq!(report.blocked().len(), 1);
        assert_eq!(report.get("c").map(|n| n.state), Some(NodeState::Pending));
    }
}
