//! Infrastructure removal

use std::time::Duration;

use async_trait::async_trait;
use decom_common::Result;
use decom_plan::TeardownUnit;

#[cfg(test)]
use mockall::automock;

/// Removes the infrastructure behind teardown units
///
/// Removal must be safe to repeat: removing something already gone succeeds.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Infrastructure: Send + Sync {
    /// Issue removal of a unit. Returns once the removal is accepted.
    async fn remove_unit(&self, unit: &TeardownUnit) -> Result<()>;

    /// Block until the unit is gone, failing with `DeletionTimedOut` after
    /// `timeout`
    async fn await_removed(&self, unit: &TeardownUnit, timeout: Duration) -> Result<()>;
}
