//! Planner input: what a cluster is known to contain

use decom_common::ResourceRef;
use serde::Serialize;

/// Where a [`ClusterState`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StateSource {
    /// Read from the live management cluster
    Live,
    /// Built from the declared configuration because live state was unavailable
    Declared,
}

/// A node group and, when discoverable, its member nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeGroupState {
    /// Node group name
    pub name: String,
    /// Object backing the node group
    pub resource: ResourceRef,
    /// Member node names; `None` when membership could not be read
    pub nodes: Option<Vec<String>>,
}

/// A supporting stack and the stacks it depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackState {
    /// Stack name
    pub name: String,
    /// Object backing the stack
    pub resource: ResourceRef,
    /// Names of other stacks that must outlive this one
    pub depends_on: Vec<String>,
}

/// Snapshot of a cluster's teardown-relevant resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterState {
    /// Cluster name
    pub cluster: String,
    /// Live or declared
    pub source: StateSource,
    /// Node groups
    pub node_groups: Vec<NodeGroupState>,
    /// Supporting stacks
    pub stacks: Vec<StackState>,
    /// The cluster record, if known
    pub cluster_record: Option<ResourceRef>,
    /// Resources known to exist but left out of this snapshot
    pub omitted: Vec<String>,
}

impl ClusterState {
    /// Empty state for a cluster
    pub fn new(cluster: impl Into<String>, source: StateSource) -> Self {
        Self {
            cluster: cluster.into(),
            source,
            node_groups: Vec::new(),
            stacks: Vec::new(),
            cluster_record: None,
            omitted: Vec::new(),
        }
    }

    /// True when the state was not read from the live cluster
    pub fn is_degraded(&self) -> bool {
        self.source == StateSource::Declared
    }

    /// Look up a node group by name
    pub fn node_group(&self, name: &str) -> Option<&NodeGroupState> {
        self.node_groups.iter().find(|ng| ng.name == name)
    }
}
