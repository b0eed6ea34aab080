//! Cluster deletion orchestration
//!
//! [`DeletionOrchestrator::delete`] is the single entry point:
//!
//! ```text
//! resolve live state ──(unreachable, force)──► degraded state
//!        │
//!        ▼
//!   teardown plan ──► for each unit in order:
//!                        drain (node groups) ─► remove ─► [await removal]
//!        │
//!        ▼
//!   DeletionOutcome { removed, failed, status }
//! ```
//!
//! Without force the first failure stops the run. With force every unit that
//! is not blocked by an unremoved dependent is still attempted, and failures
//! are recorded in the outcome.

#![deny(missing_docs)]

mod capi;
mod handle;
mod infra;
mod orchestrator;
mod outcome;
mod resolver;

pub use capi::{CapiClusterResolver, CapiInfrastructure};
pub use handle::ClusterHandle;
pub use infra::Infrastructure;
pub use orchestrator::DeletionOrchestrator;
pub use outcome::{DeletionOutcome, DeletionStatus, FailureKind, UnitFailure};
pub use resolver::ClusterResolver;
