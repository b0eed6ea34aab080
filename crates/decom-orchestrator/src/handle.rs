//! Resolved view of the cluster being deleted

use std::sync::Arc;

use decom_common::ClusterIdentity;
use decom_drain::{NodeDrainer, NodeGroupHandle};
use decom_plan::ClusterState;

/// What the orchestrator knows about the target cluster
///
/// Built either from confirmed live data ([`ClusterHandle::live`]) or from
/// declared configuration when the live cluster could not be read
/// ([`ClusterHandle::degraded`]). Both expose the same interface.
#[derive(Clone)]
pub struct ClusterHandle {
    identity: ClusterIdentity,
    state: ClusterState,
    drainer: Option<Arc<dyn NodeDrainer>>,
}

impl ClusterHandle {
    /// Handle backed by live state, with node access for draining
    pub fn live(
        identity: ClusterIdentity,
        state: ClusterState,
        drainer: Arc<dyn NodeDrainer>,
    ) -> Self {
        Self {
            identity,
            state,
            drainer: Some(drainer),
        }
    }

    /// Best-effort handle; node access may be unavailable
    pub fn degraded(
        identity: ClusterIdentity,
        state: ClusterState,
        drainer: Option<Arc<dyn NodeDrainer>>,
    ) -> Self {
        Self {
            identity,
            state,
            drainer,
        }
    }

    /// Snapshot handed to the planner
    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    /// True if built without confirmed live state
    pub fn is_degraded(&self) -> bool {
        self.state.is_degraded()
    }

    /// Node access, if any
    pub fn drainer(&self) -> Option<&Arc<dyn NodeDrainer>> {
        self.drainer.as_ref()
    }

    /// Member nodes of a node group; empty when membership is unknown
    pub fn node_group(&self, name: &str) -> NodeGroupHandle {
        let nodes = self
            .state
            .node_group(name)
            .and_then(|ng| ng.nodes.clone())
            .unwrap_or_default();
        NodeGroupHandle::new(name, nodes)
    }
}

impl std::fmt::Debug for ClusterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterHandle")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .field("drainer", &self.drainer.is_some())
            .finish()
    }
}
