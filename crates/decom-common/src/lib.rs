//! Common types for decom: errors, deletion requests, declared cluster
//! configuration, and kube/retry utilities

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod kube_utils;
pub mod request;
pub mod retry;
pub mod yaml;

pub use config::ClusterConfig;
pub use error::{Error, ErrorKind};
pub use request::{ClusterIdentity, DeletionRequest, DrainLimits, ResourceRef};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default ceiling for concurrent node drains within one node group
pub const DEFAULT_MAX_PARALLEL: usize = 25;

/// API version used for CAPI core objects when discovery is not available
pub const CAPI_API_VERSION: &str = "cluster.x-k8s.io/v1beta1";

/// Label CAPI puts on every object belonging to a cluster
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Label CAPI puts on Machines created by a MachineDeployment
pub const DEPLOYMENT_NAME_LABEL: &str = "cluster.x-k8s.io/deployment-name";

/// Namespace holding the CAPI objects for a cluster (e.g. "capi-prod")
pub fn capi_namespace(cluster_name: &str) -> String {
    format!("capi-{}", cluster_name)
}

/// Name of the secret holding the workload cluster kubeconfig
pub fn kubeconfig_secret_name(cluster_name: &str) -> String {
    format!("{}-kubeconfig", cluster_name)
}
