//! Teardown planning for cluster deletion
//!
//! Turns a snapshot of what a cluster contains ([`ClusterState`]) into a
//! [`TeardownPlan`]: every node group, supporting stack and the cluster record,
//! ordered so that a unit is always removed before the units it depends on.
//!
//! ```text
//! node groups ──► supporting stacks ──► cluster record
//!  (first)          (dependsOn order)       (last)
//! ```

#![deny(missing_docs)]

mod plan;
mod planner;
mod state;

pub use plan::{TeardownPlan, TeardownUnit, UnitKind};
pub use planner::{PlanOutput, PlanWarning, TeardownPlanner};
pub use state::{ClusterState, NodeGroupState, StackState, StateSource};
