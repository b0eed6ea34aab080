//! Per-node drain operations

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

#[cfg(test)]
use mockall::automock;

use crate::error::{DrainError, EvictionError};

/// A pod scheduled for removal from a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PodRef {
    /// Pod namespace
    pub namespace: String,
    /// Pod name
    pub name: String,
    /// UID of the pod instance seen when listing; a pod recreated under the
    /// same name has a different one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl PodRef {
    /// Create a new PodRef
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: None,
        }
    }

    /// Pin the reference to one pod instance
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Node and pod operations needed to drain a node
///
/// Implementations must treat an already-removed pod as success.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeDrainer: Send + Sync {
    /// Mark the node unschedulable
    async fn cordon(&self, node: &str) -> Result<(), DrainError>;

    /// Pods on the node that a drain must remove
    async fn list_evictable_pods(&self, node: &str) -> Result<Vec<PodRef>, DrainError>;

    /// Request a budget-honoring eviction
    async fn evict_pod(&self, pod: &PodRef) -> Result<(), EvictionError>;

    /// Delete the pod without budget checks
    async fn delete_pod(&self, pod: &PodRef) -> Result<(), DrainError>;

    /// Whether the pod still exists. A pod of the same name but a different
    /// UID counts as gone.
    async fn pod_exists(&self, pod: &PodRef) -> Result<bool, DrainError>;
}
