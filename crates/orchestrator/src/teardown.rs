//! Teardown - delete managed resources, dependents first

use crate::graph::Graph;
use crate::retry::{LogCallback, with_retry};
use crate::types::{RetryConfig, TeardownSummary};

/// Delete every managed resource of `graph` in reverse topological order
///
/// Pre-existing resources are never deleted and absent objects are
/// skipped. A failed deletion is recorded and the teardown continues.
pub fn teardown(graph: &Graph, retry: &RetryConfig) -> TeardownSummary {
    let mut summary = TeardownSummary::default();

    for &index in graph.topological_order().iter().rev() {
        let node = graph.node(index);
        let key = node.key();
        let resource = node.resource();

        if node.is_existing() {
            log::debug!("leaving pre-existing {key} in place");
            summary.skipped.push(key.to_string());
            continue;
        }

        let lookup = format!("lookup {key}");
        match with_retry(retry, Some(&LogCallback { operation: &lookup }), || resource.lookup()) {
            Ok(None) => {
                log::debug!("{key} is already absent");
                summary.skipped.push(key.to_string());
                continue;
            }
            Ok(Some(_)) => {}
            Err(e) => {
                summary.failed.push((key.to_string(), e.to_string()));
                continue;
            }
        }

        let operation = format!("delete {key}");
        match with_retry(retry, Some(&LogCallback { operation: &operation }), || resource.delete()) {
            Ok(()) => {
                log::info!("deleted {key}");
                summary.removed.push(key.to_string());
            }
            Err(e) => {
                log::warn!("failed to delete {key}: {e}");
                summary.failed.push((key.to_string(), e.to_string()));
            }
        }
    }

    summary
}
