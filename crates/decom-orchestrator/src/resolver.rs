//! Cluster state resolution

use async_trait::async_trait;
use decom_common::{ClusterIdentity, Result};

#[cfg(test)]
use mockall::automock;

use crate::handle::ClusterHandle;

/// Obtains the state of a cluster before deletion
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterResolver: Send + Sync {
    /// Read the cluster's current live state. May fail (e.g. the cluster was
    /// never fully created).
    async fn resolve_live(&self, identity: &ClusterIdentity) -> Result<ClusterHandle>;

    /// Build a handle usable without live-state confirmation, from whatever
    /// declared configuration is available
    async fn resolve_degraded(&self, identity: &ClusterIdentity) -> Result<ClusterHandle>;
}
