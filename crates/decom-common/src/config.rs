//! Declared cluster configuration
//!
//! The configuration file describes what a cluster is *supposed* to contain.
//! It is the fallback source of truth when the live cluster cannot be read:
//!
//! ```yaml
//! apiVersion: decom.dev/v1alpha1
//! kind: ClusterConfig
//! metadata:
//!   name: prod
//!   region: us-west-2
//! nodeGroups:
//!   - name: workers
//! stacks:
//!   - name: prod-control-plane
//!     apiVersion: controlplane.cluster.x-k8s.io/v1beta1
//!     kind: KubeadmControlPlane
//!     dependsOn: [prod]
//!   - name: prod
//!     apiVersion: infrastructure.cluster.x-k8s.io/v1beta2
//!     kind: AWSCluster
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::request::ClusterIdentity;
use crate::{capi_namespace, yaml, Error, Result};

/// API version accepted in configuration files
pub const CONFIG_API_VERSION: &str = "decom.dev/v1alpha1";

/// Kind accepted in configuration files
pub const CONFIG_KIND: &str = "ClusterConfig";

/// Declared configuration of one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Schema version
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Always "ClusterConfig"
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Cluster metadata
    pub metadata: ClusterMeta,
    /// Declared node groups
    #[serde(default)]
    pub node_groups: Vec<NodeGroupConfig>,
    /// Declared supporting stacks
    #[serde(default)]
    pub stacks: Vec<StackConfig>,
}

/// Cluster metadata block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMeta {
    /// Cluster name
    #[serde(default)]
    pub name: String,
    /// Cloud region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Namespace holding CAPI objects (default `capi-<name>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A declared node group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupConfig {
    /// Node group (MachineDeployment) name
    pub name: String,
}

/// A declared supporting stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackConfig {
    /// Object name
    pub name: String,
    /// Object API version
    pub api_version: String,
    /// Object kind
    pub kind: String,
    /// Names of other stacks this one depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

fn default_api_version() -> String {
    CONFIG_API_VERSION.to_string()
}

fn default_kind() -> String {
    CONFIG_KIND.to_string()
}

impl ClusterConfig {
    /// An empty configuration for a named cluster
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ClusterMeta {
                name: name.into(),
                ..Default::default()
            },
            node_groups: Vec::new(),
            stacks: Vec::new(),
        }
    }

    /// Parse and validate a configuration document
    pub fn from_yaml(input: &str, source: &str) -> Result<Self> {
        let config: ClusterConfig =
            yaml::parse_yaml_as(input).map_err(|e| Error::config(source, e.to_string()))?;
        config.validate(source)?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let source = path.display().to_string();
        let input = std::fs::read_to_string(path)
            .map_err(|e| Error::config(&source, format!("failed to read: {}", e)))?;
        Self::from_yaml(&input, &source)
    }

    fn validate(&self, source: &str) -> Result<()> {
        if self.kind != CONFIG_KIND {
            return Err(Error::config(
                source,
                format!("unsupported kind {:?}, expected {:?}", self.kind, CONFIG_KIND),
            ));
        }
        if self.api_version != CONFIG_API_VERSION {
            return Err(Error::config(
                source,
                format!(
                    "unsupported apiVersion {:?}, expected {:?}",
                    self.api_version, CONFIG_API_VERSION
                ),
            ));
        }

        let mut seen = HashSet::new();
        let names = self
            .node_groups
            .iter()
            .map(|ng| ng.name.as_str())
            .chain(self.stacks.iter().map(|s| s.name.as_str()));
        for name in names {
            if name.is_empty() {
                return Err(Error::config(source, "node groups and stacks need a name"));
            }
            if !seen.insert(name) {
                return Err(Error::config(
                    source,
                    format!("{:?} is declared more than once", name),
                ));
            }
        }

        for stack in &self.stacks {
            if stack.depends_on.iter().any(|d| d == &stack.name) {
                return Err(Error::config(
                    source,
                    format!("stack {:?} depends on itself", stack.name),
                ));
            }
        }

        Ok(())
    }

    /// Namespace holding this cluster's CAPI objects
    pub fn namespace(&self) -> String {
        self.metadata
            .namespace
            .clone()
            .unwrap_or_else(|| capi_namespace(&self.metadata.name))
    }

    /// Identity of the declared cluster
    pub fn identity(&self) -> ClusterIdentity {
        let mut identity =
            ClusterIdentity::new(self.metadata.name.clone()).with_namespace(self.namespace());
        identity.region = self.metadata.region.clone();
        identity
    }

    /// Pretty JSON rendering used for debug logging
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::internal_with_context("config", e.to_string()))
    }
}
