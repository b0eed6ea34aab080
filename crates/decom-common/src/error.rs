//! Error types for cluster deletion
//!
//! Errors carry the cluster, unit or node group they concern so a failed
//! teardown can be diagnosed from the log line alone. `Error::kind` maps the
//! deletion-specific variants onto the [`ErrorKind`] taxonomy that the
//! orchestrator uses when applying the force/stop policy.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Classification of deletion failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Live cluster state could not be read and force was not set
    ClusterUnreachable,
    /// A node group could not be fully drained
    DrainFailed,
    /// The infrastructure collaborator rejected a removal
    RemovalFailed,
    /// Removal was issued but not confirmed within the wait bound
    DeletionTimedOut,
    /// A degraded plan omitted resources that could not be discovered
    PlanningIncomplete,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ClusterUnreachable => "ClusterUnreachable",
            ErrorKind::DrainFailed => "DrainFailed",
            ErrorKind::RemovalFailed => "RemovalFailed",
            ErrorKind::DeletionTimedOut => "DeletionTimedOut",
            ErrorKind::PlanningIncomplete => "PlanningIncomplete",
        };
        f.write_str(s)
    }
}

/// Main error type for decom operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid request or configuration value
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The offending field or flag, if known (e.g. "parallel")
        field: Option<String>,
    },

    /// Declared cluster configuration could not be loaded
    #[error("config error [{path}]: {message}")]
    Config {
        /// Path of the configuration file
        path: String,
        /// Description of what failed
        message: String,
    },

    /// Live cluster state could not be obtained
    #[error("cluster {cluster} is unreachable: {message}")]
    ClusterUnreachable {
        /// Cluster being deleted
        cluster: String,
        /// Underlying cause
        message: String,
    },

    /// Node group drain did not complete on every member node
    #[error("failed to drain node group {node_group}: {message}")]
    DrainFailed {
        /// Node group whose drain failed
        node_group: String,
        /// Per-node failure summary
        message: String,
    },

    /// Infrastructure removal was rejected
    #[error("failed to remove {unit}: {message}")]
    RemovalFailed {
        /// Teardown unit that could not be removed
        unit: String,
        /// Underlying cause
        message: String,
    },

    /// Removal not confirmed within the wait bound
    #[error("timed out after {}s waiting for {unit} to be removed", timeout.as_secs())]
    DeletionTimedOut {
        /// Teardown unit still pending
        unit: String,
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// Teardown plan could not be computed
    #[error("planning error for {cluster}: {message}")]
    Planning {
        /// Cluster being planned
        cluster: String,
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "create_client")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error naming the offending field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a config error for the given file
    pub fn config(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a cluster-unreachable error
    pub fn cluster_unreachable(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ClusterUnreachable {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a drain failure for a node group
    pub fn drain_failed(node_group: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::DrainFailed {
            node_group: node_group.into(),
            message: msg.into(),
        }
    }

    /// Create a removal failure for a unit
    pub fn removal_failed(unit: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RemovalFailed {
            unit: unit.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error for a unit
    pub fn deletion_timed_out(unit: impl Into<String>, timeout: Duration) -> Self {
        Self::DeletionTimedOut {
            unit: unit.into(),
            timeout,
        }
    }

    /// Create a planning error
    pub fn planning(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Planning {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// The deletion taxonomy kind of this error, if it has one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::ClusterUnreachable { .. } => Some(ErrorKind::ClusterUnreachable),
            Error::DrainFailed { .. } => Some(ErrorKind::DrainFailed),
            Error::RemovalFailed { .. } => Some(ErrorKind::RemovalFailed),
            Error::DeletionTimedOut { .. } => Some(ErrorKind::DeletionTimedOut),
            _ => None,
        }
    }

    /// Check if this error is retryable
    ///
    /// Kubernetes 4xx responses, validation and config errors need a fix
    /// before retrying; connection-level failures do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Validation { .. } | Error::Config { .. } | Error::Planning { .. } => false,
            Error::ClusterUnreachable { .. } => true,
            Error::DrainFailed { .. } => true,
            Error::RemovalFailed { .. } => true,
            Error::DeletionTimedOut { .. } => true,
            Error::Internal { .. } => true,
        }
    }
}
