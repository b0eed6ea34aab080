//! Error types for node draining

use std::time::Duration;

use thiserror::Error;

/// Failure to evict a single pod
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvictionError {
    /// A disruption budget does not allow the eviction right now (HTTP 429)
    #[error("eviction of {pod} blocked by a disruption budget")]
    BudgetBlocked {
        /// Pod as "namespace/name"
        pod: String,
    },

    /// Transient failure, e.g. conflicting budgets (HTTP 500) or a dropped connection
    #[error("eviction of {pod} failed: {message}")]
    Retryable {
        /// Pod as "namespace/name"
        pod: String,
        /// Underlying cause
        message: String,
    },

    /// The eviction can never succeed (e.g. forbidden)
    #[error("eviction of {pod} rejected: {message}")]
    Fatal {
        /// Pod as "namespace/name"
        pod: String,
        /// Underlying cause
        message: String,
    },
}

impl EvictionError {
    /// Whether another attempt may succeed
    pub fn should_retry(&self) -> bool {
        matches!(
            self,
            EvictionError::BudgetBlocked { .. } | EvictionError::Retryable { .. }
        )
    }
}

/// Failure to drain one node
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DrainError {
    /// Node could not be marked unschedulable
    #[error("failed to cordon node {node}: {message}")]
    Cordon {
        /// Node name
        node: String,
        /// Underlying cause
        message: String,
    },

    /// Pods on the node could not be listed
    #[error("failed to list pods on node {node}: {message}")]
    ListPods {
        /// Node name
        node: String,
        /// Underlying cause
        message: String,
    },

    /// A pod could not be evicted within the retry bound
    #[error(transparent)]
    Eviction(#[from] EvictionError),

    /// A pod could not be deleted
    #[error("failed to delete pod {pod}: {message}")]
    DeletePod {
        /// Pod as "namespace/name"
        pod: String,
        /// Underlying cause
        message: String,
    },

    /// Pod existence could not be checked
    #[error("failed to check pod {pod}: {message}")]
    PodLookup {
        /// Pod as "namespace/name"
        pod: String,
        /// Underlying cause
        message: String,
    },

    /// Pods were still present when the removal bound expired
    #[error("{remaining} pod(s) still on node {node} after {}s", timeout.as_secs())]
    PodsRemaining {
        /// Node name
        node: String,
        /// Pods that had not gone yet
        remaining: usize,
        /// The bound that was exceeded
        timeout: Duration,
    },
}
