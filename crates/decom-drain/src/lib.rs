//! Node group draining
//!
//! Removes workloads from every member node of a node group before the group's
//! backing infrastructure is deleted. Nodes drain concurrently under a caller
//! supplied bound; pods are either evicted (honoring disruption budgets) or
//! deleted outright.
//!
//! ```text
//! DrainCoordinator::drain(group, parallel, use_eviction)
//!   └─ up to `parallel` nodes at once:
//!        cordon ─► list pods ─► evict / delete ─► wait for pods to go
//! ```

#![deny(missing_docs)]

mod coordinator;
mod drainer;
mod error;
mod kube_drainer;

pub use coordinator::{DrainConfig, DrainCoordinator, DrainResult, NodeGroupHandle, NodeOutcome};
pub use drainer::{NodeDrainer, PodRef};
pub use error::{DrainError, EvictionError};
pub use kube_drainer::{is_evictable, KubeNodeDrainer};
