//! # Orchestrator
//!
//! Dependency-graph orchestration for interdependent cluster resources.
//!
//! Resources are declared with "depends on" edges. The engine creates
//! every resource once its dependencies are ready enough, polls readiness
//! with a per-pass status cache, honours partial-readiness thresholds,
//! and reports drift instead of overwriting live objects.
//!
//! ## Core Concepts
//!
//! - **Resource**: adapter binding one declared object to the remote system
//! - **Graph**: validated, acyclic set of nodes and edges, built once per run
//! - **StatusCache**: memo of readiness within one evaluation pass
//! - **DependencyReport**: whether an edge currently blocks its dependent
//! - **Executor**: worker-per-ready-node scheduler with retries
//!
//! ## Example
//!
//! ```ignore
//! use orchestrator::{Declaration, ExecuteOptions, Graph, execute_simple};
//!
//! let graph = Graph::build(vec![
//!     Declaration::new(config_map),
//!     Declaration::new(deployment).depends_on("configmap/settings"),
//! ])?;
//!
//! let report = execute_simple(&graph, &ExecuteOptions::default())?;
//! assert!(report.is_success());
//! ```
//!
//! Partial readiness is configured per edge with the `success_factor`
//! meta key. Percentages truncate and ties unblock.

pub mod cache;
pub mod error;
pub mod executor;
pub mod graph;
pub mod observer;
pub mod report;
pub mod resource;
pub mod retry;
pub mod snapshot;
pub mod teardown;
pub mod types;

// Re-export main types at crate root
pub use cache::{Pass, StatusCache};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{execute, execute_simple};
pub use graph::{
    Declaration, DependencyLink, DependencySpec, Edge, Graph, Labels, Node, infer_dependencies,
};
pub use observer::{NoObserver, RunObserver};
pub use report::{DependencyReport, SUCCESS_FACTOR_KEY, percentage, required_percentage};
pub use resource::{Capabilities, LiveObject, Resource, SharedResource};
pub use retry::{LogCallback, NoCallback, RetryCallback, with_retry};
pub use snapshot::{NodeSnapshot, StatusSnapshot, snapshot};
pub use teardown::teardown;
pub use types::{
    CreateOutcome, ExecuteOptions, Meta, NodeOutcome, NodeState, ResourceStatus, RetryConfig,
    RunReport, TeardownSummary,
};
