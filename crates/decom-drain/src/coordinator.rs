//! Drain coordination across the nodes of one node group

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use decom_common::kube_utils::poll_until;
use decom_common::retry::{retry_with_backoff_if, RetryConfig};
use decom_common::Error;
use futures::{stream, StreamExt};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::drainer::{NodeDrainer, PodRef};
use crate::error::{DrainError, EvictionError};

/// How often to check whether removed pods are gone
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// How long to wait for a node's pods to go once removal was requested
pub const DEFAULT_POD_REMOVAL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Pods removed concurrently on one node
pub const DEFAULT_POD_CONCURRENCY: usize = 5;

/// Drain tunables
#[derive(Debug, Clone, PartialEq)]
pub struct DrainConfig {
    /// Backoff for evictions blocked by a disruption budget
    pub eviction_retry: RetryConfig,
    /// Interval between checks for removed pods
    pub poll_interval: Duration,
    /// Bound on waiting for a node's pods to disappear
    pub pod_removal_timeout: Duration,
    /// Pods removed concurrently on one node
    pub pod_concurrency: usize,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            eviction_retry: RetryConfig {
                max_attempts: 10,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(20),
                backoff_multiplier: 2.0,
            },
            poll_interval: DEFAULT_POLL_INTERVAL,
            pod_removal_timeout: DEFAULT_POD_REMOVAL_TIMEOUT,
            pod_concurrency: DEFAULT_POD_CONCURRENCY,
        }
    }
}

/// The member nodes of one node group
///
/// A reference only: node lifecycle belongs to the infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeGroupHandle {
    /// Node group name
    pub name: String,
    /// Member node names
    pub nodes: Vec<String>,
}

impl NodeGroupHandle {
    /// Create a handle
    pub fn new(name: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }
}

/// Result of draining one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Every evictable pod was removed
    Drained {
        /// Number of pods removed
        pods: usize,
    },
    /// The node could not be drained
    Failed(DrainError),
}

impl NodeOutcome {
    /// True for [`NodeOutcome::Drained`]
    pub fn is_drained(&self) -> bool {
        matches!(self, NodeOutcome::Drained { .. })
    }
}

/// Per-node results of draining a node group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainResult {
    /// Node group name
    pub node_group: String,
    /// Outcome per node
    pub nodes: BTreeMap<String, NodeOutcome>,
}

impl DrainResult {
    /// The group is drained only if every node is
    pub fn is_drained(&self) -> bool {
        self.nodes.values().all(NodeOutcome::is_drained)
    }

    /// Failed nodes with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &DrainError)> {
        self.nodes.iter().filter_map(|(node, outcome)| match outcome {
            NodeOutcome::Failed(e) => Some((node.as_str(), e)),
            NodeOutcome::Drained { .. } => None,
        })
    }

    /// "node: error" for every failed node, joined with "; "
    pub fn failure_summary(&self) -> String {
        self.failures()
            .map(|(node, e)| format!("{}: {}", node, e))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Drains node groups through a [`NodeDrainer`]
pub struct DrainCoordinator {
    drainer: Arc<dyn NodeDrainer>,
    config: DrainConfig,
}

impl DrainCoordinator {
    /// Create a coordinator
    pub fn new(drainer: Arc<dyn NodeDrainer>, config: DrainConfig) -> Self {
        Self { drainer, config }
    }

    /// Drain every member node of `group`, at most `parallel` at a time.
    ///
    /// A failing node does not stop its siblings: every started drain runs
    /// to completion before the result is returned.
    #[instrument(skip(self, group), fields(node_group = %group.name, nodes = group.nodes.len()))]
    pub async fn drain(
        &self,
        group: &NodeGroupHandle,
        parallel: usize,
        use_eviction: bool,
    ) -> DrainResult {
        info!(parallel, use_eviction, "Draining node group");

        let nodes: BTreeMap<String, NodeOutcome> = stream::iter(group.nodes.iter().cloned())
            .map(|node| async move {
                let outcome = match self.drain_node(&node, use_eviction).await {
                    Ok(pods) => NodeOutcome::Drained { pods },
                    Err(e) => {
                        warn!(node = %node, error = %e, "Node drain failed");
                        NodeOutcome::Failed(e)
                    }
                };
                (node, outcome)
            })
            .buffer_unordered(parallel.max(1))
            .collect()
            .await;

        let result = DrainResult {
            node_group: group.name.clone(),
            nodes,
        };
        if result.is_drained() {
            info!("Node group drained");
        }
        result
    }

    async fn drain_node(&self, node: &str, use_eviction: bool) -> Result<usize, DrainError> {
        self.drainer.cordon(node).await?;
        let pods = self.drainer.list_evictable_pods(node).await?;
        if pods.is_empty() {
            return Ok(0);
        }

        let results: Vec<Result<(), DrainError>> = stream::iter(pods.iter())
            .map(|pod| self.remove_pod(pod, use_eviction))
            .buffer_unordered(self.config.pod_concurrency.max(1))
            .collect()
            .await;
        if let Some(err) = results.into_iter().find_map(Result::err) {
            return Err(err);
        }

        self.wait_for_pods_gone(node, &pods).await?;
        Ok(pods.len())
    }

    async fn remove_pod(&self, pod: &PodRef, use_eviction: bool) -> Result<(), DrainError> {
        if !use_eviction {
            return self.drainer.delete_pod(pod).await;
        }
        retry_with_backoff_if(
            &self.config.eviction_retry,
            "evict_pod",
            || self.drainer.evict_pod(pod),
            EvictionError::should_retry,
        )
        .await
        .map_err(DrainError::from)
    }

    async fn wait_for_pods_gone(&self, node: &str, pods: &[PodRef]) -> Result<(), DrainError> {
        let drainer = &self.drainer;
        let gone = poll_until(
            self.config.pod_removal_timeout,
            self.config.poll_interval,
            || async move {
                for pod in pods {
                    match drainer.pod_exists(pod).await {
                        Ok(false) => {}
                        Ok(true) => return Ok(false),
                        Err(e) => return Err(Error::internal_with_context("drain", e.to_string())),
                    }
                }
                Ok(true)
            },
        )
        .await;

        if gone {
            return Ok(());
        }

        let mut remaining = 0;
        for pod in pods {
            if !matches!(self.drainer.pod_exists(pod).await, Ok(false)) {
                remaining += 1;
            }
        }
        Err(DrainError::PodsRemaining {
            node: node.to_string(),
            remaining,
            timeout: self.config.pod_removal_timeout,
        })
    }
}
