//! Deletion run parameters and resource identities

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{capi_namespace, Error, Result, DEFAULT_MAX_PARALLEL};

/// Default bound on how long a waiting deletion blocks
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25 * 60);

/// The cluster targeted by a deletion run. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    /// Cluster name
    pub name: String,
    /// Cloud region, if known
    pub region: Option<String>,
    /// Namespace holding the cluster's CAPI objects
    pub namespace: String,
    /// Kubeconfig context of the management cluster, if not the current one
    pub context: Option<String>,
}

impl ClusterIdentity {
    /// Identity with the conventional CAPI namespace for `name`
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            namespace: capi_namespace(&name),
            name,
            region: None,
            context: None,
        }
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Override the CAPI namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the kubeconfig context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{} ({})", self.name, region),
            None => f.write_str(&self.name),
        }
    }
}

/// Identity of the Kubernetes object backing a teardown unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// API version (e.g. "cluster.x-k8s.io/v1beta1")
    pub api_version: String,
    /// Kind (e.g. "MachineDeployment")
    pub kind: String,
    /// Namespace (empty for cluster-scoped)
    pub namespace: String,
    /// Name
    pub name: String,
}

impl ResourceRef {
    /// Create a new ResourceRef
    pub fn new(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Operational ceiling on drain parallelism
///
/// The ceiling is policy, not structure: callers may raise or lower it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainLimits {
    /// Largest accepted `parallel` value
    pub max_parallel: usize,
}

impl Default for DrainLimits {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

impl DrainLimits {
    /// Validate a requested parallelism against this ceiling
    pub fn validate_parallel(&self, parallel: usize) -> Result<usize> {
        if self.max_parallel == 0 {
            return Err(Error::validation_for_field(
                "max_parallel",
                "parallelism ceiling must be at least 1",
            ));
        }
        if parallel == 0 || parallel > self.max_parallel {
            return Err(Error::validation_for_field(
                "parallel",
                format!(
                    "parallel must be between 1 and {} (got {})",
                    self.max_parallel, parallel
                ),
            ));
        }
        Ok(parallel)
    }
}

/// Parameters of one deletion run
///
/// Built once through [`DeletionRequest::builder`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    force: bool,
    disable_nodegroup_eviction: bool,
    parallel: usize,
    wait: bool,
    timeout: Duration,
}

impl DeletionRequest {
    /// Start building a request with defaults (no force, eviction on,
    /// parallel 1, no wait, 25 minute timeout)
    pub fn builder() -> DeletionRequestBuilder {
        DeletionRequestBuilder::default()
    }

    /// Continue past per-unit failures and tolerate missing live state
    pub fn force(&self) -> bool {
        self.force
    }

    /// Bypass disruption budgets by deleting pods instead of evicting them
    pub fn disable_nodegroup_eviction(&self) -> bool {
        self.disable_nodegroup_eviction
    }

    /// Whether drains should use the eviction API
    pub fn use_eviction(&self) -> bool {
        !self.disable_nodegroup_eviction
    }

    /// Maximum number of nodes drained concurrently within one node group
    pub fn parallel(&self) -> usize {
        self.parallel
    }

    /// Block until removals are confirmed
    pub fn wait(&self) -> bool {
        self.wait
    }

    /// Bound on the time spent waiting for confirmation
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder for [`DeletionRequest`]
#[derive(Debug, Clone)]
pub struct DeletionRequestBuilder {
    force: bool,
    disable_nodegroup_eviction: bool,
    parallel: usize,
    wait: bool,
    timeout: Duration,
    limits: DrainLimits,
}

impl Default for DeletionRequestBuilder {
    fn default() -> Self {
        Self {
            force: false,
            disable_nodegroup_eviction: false,
            parallel: 1,
            wait: false,
            timeout: DEFAULT_TIMEOUT,
            limits: DrainLimits::default(),
        }
    }
}

impl DeletionRequestBuilder {
    /// Set force mode
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the eviction bypass
    pub fn disable_nodegroup_eviction(mut self, disable: bool) -> Self {
        self.disable_nodegroup_eviction = disable;
        self
    }

    /// Set drain parallelism
    pub fn parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set wait mode
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Set the wait timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the parallelism ceiling
    pub fn limits(mut self, limits: DrainLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Validate and build the request
    pub fn build(self) -> Result<DeletionRequest> {
        let parallel = self.limits.validate_parallel(self.parallel)?;
        if self.wait && self.timeout.is_zero() {
            return Err(Error::validation_for_field(
                "timeout",
                "timeout must be greater than zero when waiting",
            ));
        }
        Ok(DeletionRequest {
            force: self.force,
            disable_nodegroup_eviction: self.disable_nodegroup_eviction,
            parallel,
            wait: self.wait,
            timeout: self.timeout,
        })
    }
}
