//! Accumulated result of a deletion run

use std::fmt;

use decom_common::{Error, ErrorKind, Result};
use decom_plan::{PlanWarning, TeardownUnit, UnitKind};
use serde::Serialize;

/// Overall result of a deletion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletionStatus {
    /// Every unit was removed
    Succeeded,
    /// Force mode kept going past at least one failure
    PartialFailure,
    /// The run stopped at the first failure
    Failed,
}

impl fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeletionStatus::Succeeded => "Succeeded",
            DeletionStatus::PartialFailure => "PartialFailure",
            DeletionStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Why a unit was not removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The node group could not be drained, so it was left in place
    DrainFailed,
    /// Infrastructure removal was rejected
    RemovalFailed,
    /// Removal was issued but not confirmed in time
    DeletionTimedOut,
    /// A unit depending on this one was not removed
    Blocked,
}

impl FailureKind {
    fn from_error(err: &Error) -> Self {
        match err.kind() {
            Some(ErrorKind::DrainFailed) => FailureKind::DrainFailed,
            Some(ErrorKind::DeletionTimedOut) => FailureKind::DeletionTimedOut,
            _ => FailureKind::RemovalFailed,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::DrainFailed => "DrainFailed",
            FailureKind::RemovalFailed => "RemovalFailed",
            FailureKind::DeletionTimedOut => "DeletionTimedOut",
            FailureKind::Blocked => "Blocked",
        };
        f.write_str(s)
    }
}

/// A unit that was not removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    /// Unit id ("Kind/name")
    pub unit: String,
    /// Unit kind
    pub unit_kind: UnitKind,
    /// Failure classification
    pub kind: FailureKind,
    /// Human-readable reason, never empty
    pub reason: String,
}

/// Result of one deletion run
///
/// Built incrementally while the plan is walked. A run stopped without force
/// keeps the error that stopped it; [`DeletionOutcome::into_result`] hands it
/// back unchanged.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionOutcome {
    /// Cluster name
    pub cluster: String,
    /// Ids of removed units, in removal order
    pub removed: Vec<String>,
    /// Units that were not removed
    pub failed: Vec<UnitFailure>,
    /// Planner warnings
    pub warnings: Vec<PlanWarning>,
    status: DeletionStatus,
    #[serde(skip)]
    abort: Option<Error>,
}

impl DeletionOutcome {
    pub(crate) fn new(cluster: impl Into<String>, warnings: Vec<PlanWarning>) -> Self {
        Self {
            cluster: cluster.into(),
            removed: Vec::new(),
            failed: Vec::new(),
            warnings,
            status: DeletionStatus::Succeeded,
            abort: None,
        }
    }

    pub(crate) fn record_removed(&mut self, unit: &TeardownUnit) {
        self.removed.push(unit.id());
    }

    pub(crate) fn record_failure(&mut self, unit: &TeardownUnit, err: &Error) {
        self.push_failure(unit, FailureKind::from_error(err), err.to_string());
        self.status = DeletionStatus::PartialFailure;
    }

    pub(crate) fn record_blocked(&mut self, unit: &TeardownUnit, dependent: &str) {
        self.push_failure(
            unit,
            FailureKind::Blocked,
            format!("not removed because {} is still present", dependent),
        );
        self.status = DeletionStatus::PartialFailure;
    }

    pub(crate) fn abort(&mut self, unit: &TeardownUnit, err: Error) {
        self.push_failure(unit, FailureKind::from_error(&err), err.to_string());
        self.status = DeletionStatus::Failed;
        self.abort = Some(err);
    }

    fn push_failure(&mut self, unit: &TeardownUnit, kind: FailureKind, reason: String) {
        let reason = if reason.is_empty() {
            kind.to_string()
        } else {
            reason
        };
        self.failed.push(UnitFailure {
            unit: unit.id(),
            unit_kind: unit.kind,
            kind,
            reason,
        });
    }

    /// Overall status
    pub fn status(&self) -> DeletionStatus {
        self.status
    }

    /// The error that stopped a non-force run
    pub fn abort_cause(&self) -> Option<&Error> {
        self.abort.as_ref()
    }

    /// True if the unit was recorded as not removed
    pub fn is_failed(&self, unit_id: &str) -> bool {
        self.failed.iter().any(|f| f.unit == unit_id)
    }

    /// True if the unit was removed
    pub fn is_removed(&self, unit_id: &str) -> bool {
        self.removed.iter().any(|r| r == unit_id)
    }

    /// The stopping error for a failed run, otherwise the outcome itself
    pub fn into_result(mut self) -> Result<Self> {
        match self.abort.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}
