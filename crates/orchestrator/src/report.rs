//! Dependency reports - does an upstream node unblock its dependent?
//!
//! Adapters without partial-readiness support block until the upstream
//! status is `Ready`. Adapters with it report `(percentage, needed)` and
//! the edge unblocks once `percentage >= needed`, whatever the upstream
//! status. Percentages truncate toward zero and ties do not block: this
//! decides which workloads count as "ready enough", so it must not be
//! changed to rounding.

use crate::cache::{Pass, StatusCache};
use crate::error::{Error, Result};
use crate::graph::Node;
use crate::types::{Meta, ResourceStatus};
use serde::{Deserialize, Serialize};

/// Meta key holding a required percentage
pub const SUCCESS_FACTOR_KEY: &str = "success_factor";

/// Readiness of one edge at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    /// Key of the upstream node
    pub dependency: String,
    /// Whether the edge currently prevents the dependent's creation
    pub blocks: bool,
    pub percentage: u32,
    pub needed: u32,
    pub message: String,
    /// Set when the upstream can never satisfy this edge in this run
    pub error: Option<String>,
}

impl DependencyReport {
    /// Upstream fully ready
    pub fn satisfied(dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        Self {
            message: format!("{dependency} is ready"),
            dependency,
            blocks: false,
            percentage: 100,
            needed: 100,
            error: None,
        }
    }

    /// Upstream not ready yet
    pub fn waiting(dependency: impl Into<String>, status: ResourceStatus) -> Self {
        let dependency = dependency.into();
        Self {
            message: format!("{dependency} is {status}"),
            dependency,
            blocks: true,
            percentage: 0,
            needed: 100,
            error: None,
        }
    }

    /// Report for a replicated workload
    pub fn from_replicas(dependency: impl Into<String>, observed: u64, desired: u64, needed: u32) -> Self {
        let percentage = percentage(observed, desired);
        Self {
            dependency: dependency.into(),
            blocks: percentage < needed,
            percentage,
            needed,
            message: format!(
                "{observed} of {desired} replicas up ({percentage}%, needed {needed}%)"
            ),
            error: None,
        }
    }

    /// Edge can never be satisfied; surfaced to the dependent's failure path
    pub fn failed(dependency: impl Into<String>, error: impl Into<String>) -> Self {
        let dependency = dependency.into();
        let error = error.into();
        Self {
            message: format!("{dependency} failed: {error}"),
            dependency,
            blocks: true,
            percentage: 0,
            needed: 100,
            error: Some(error),
        }
    }

    /// Whether the dependent may proceed
    pub fn unblocks(&self) -> bool {
        !self.blocks && self.error.is_none()
    }

    /// Whether the upstream need not keep polling for this edge
    pub fn is_settled(&self) -> bool {
        !self.blocks || self.error.is_some()
    }
}

/// Percentage of `desired` that `observed` covers, truncated
///
/// `observed` above `desired` counts as 100; `desired == 0` is trivially
/// satisfied.
pub fn percentage(observed: u64, desired: u64) -> u32 {
    if desired == 0 {
        return 100;
    }
    let pct = observed.min(desired) * 100 / desired;
    u32::try_from(pct).unwrap_or(100)
}

/// Required percentage from `meta`, defaulting to 100
pub fn required_percentage(key: &str, meta: &Meta) -> Result<u32> {
    let Some(raw) = meta.get(SUCCESS_FACTOR_KEY) else {
        return Ok(100);
    };
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|pct| *pct <= 100)
        .ok_or_else(|| Error::InvalidPercentage {
            key: key.to_string(),
            value: raw.clone(),
        })
}

/// Evaluate one edge whose upstream is `dependency`
///
/// Transient query failures produce a blocking report without an error,
/// so the edge is simply re-evaluated on the next pass. Anything else
/// that prevents evaluation becomes a failed report.
pub fn evaluate(dependency: &Node, edge_meta: &Meta, cache: &StatusCache, pass: Pass) -> DependencyReport {
    let key = dependency.key();
    let resource = dependency.resource();

    if resource.capabilities().partial_report {
        return match resource.dependency_report(edge_meta) {
            Ok(mut report) => {
                report.dependency = key.to_string();
                report.blocks = report.percentage < report.needed;
                report
            }
            Err(e) if e.is_retryable() => {
                log::warn!("dependency report for {key} failed, will retry: {e}");
                DependencyReport {
                    message: format!("report unavailable: {e}"),
                    ..DependencyReport::waiting(key, ResourceStatus::NotReady)
                }
            }
            Err(e) => DependencyReport::failed(key, e.to_string()),
        };
    }

    match cache.get(dependency, pass) {
        Ok(ResourceStatus::Ready) => DependencyReport::satisfied(key),
        Ok(ResourceStatus::NotReady) => DependencyReport::waiting(key, ResourceStatus::NotReady),
        Ok(ResourceStatus::Error) => DependencyReport::failed(key, "resource reported an error"),
        Ok(ResourceStatus::WaitingForUpgrade) => {
            DependencyReport::failed(key, "live object differs from declaration")
        }
        Err(e) if e.is_retryable() => DependencyReport {
            message: format!("status unavailable: {e}"),
            ..DependencyReport::waiting(key, ResourceStatus::NotReady)
        },
        Err(e) => DependencyReport::failed(key, e.to_string()),
    }
}
