//! Cluster API backed resolver and infrastructure
//!
//! A cluster is a CAPI `Cluster` in the management cluster. Its node groups
//! are the `MachineDeployment`s labelled with the cluster name, and its
//! supporting stacks are the objects referenced by `spec.controlPlaneRef` and
//! `spec.infrastructureRef`, plus any extra stacks in the declared config.
//! Nodes are drained through the workload cluster API, reached with the
//! kubeconfig CAPI stores in `<cluster>-kubeconfig`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use decom_common::kube_utils::{
    build_api_resource, client_from_kubeconfig_yaml, is_not_found, poll_until,
};
use decom_common::retry::{retry_with_backoff_if, RetryConfig};
use decom_common::{
    kubeconfig_secret_name, ClusterConfig, ClusterIdentity, Error, ResourceRef, Result,
    CAPI_API_VERSION, CLUSTER_NAME_LABEL, DEPLOYMENT_NAME_LABEL,
};
use decom_drain::{KubeNodeDrainer, NodeDrainer};
use decom_plan::{ClusterState, NodeGroupState, StackState, StateSource, TeardownUnit, UnitKind};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::core::DynamicObject;
use kube::Client;
use tracing::{debug, info, instrument, warn};

use crate::handle::ClusterHandle;
use crate::infra::Infrastructure;
use crate::resolver::ClusterResolver;

/// Default interval between removal checks, the same as the node drain poll
pub const DEFAULT_REMOVAL_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Attempts at reading the Cluster before it counts as unreachable
const READ_ATTEMPTS: u32 = 3;

fn dynamic_api(client: &Client, resource: &ResourceRef) -> Api<DynamicObject> {
    let ar = build_api_resource(&resource.api_version, &resource.kind);
    if resource.namespace.is_empty() {
        Api::all_with(client.clone(), &ar)
    } else {
        Api::namespaced_with(client.clone(), &resource.namespace, &ar)
    }
}

fn capi_api(client: &Client, namespace: &str, kind: &str) -> Api<DynamicObject> {
    let ar = build_api_resource(CAPI_API_VERSION, kind);
    Api::namespaced_with(client.clone(), namespace, &ar)
}

/// Reads a `{apiVersion, kind, name, namespace}` object reference
fn object_ref(value: &serde_json::Value, default_namespace: &str) -> Option<ResourceRef> {
    let field = |key: &str| value.get(key).and_then(|v| v.as_str());
    Some(ResourceRef::new(
        field("apiVersion")?,
        field("kind")?,
        field("namespace").unwrap_or(default_namespace),
        field("name")?,
    ))
}

/// Builds the declared-config view of a cluster
fn declared_state(identity: &ClusterIdentity, declared: Option<&ClusterConfig>) -> ClusterState {
    let namespace = &identity.namespace;
    let mut state = ClusterState::new(identity.name.clone(), StateSource::Declared);
    state.cluster_record = Some(ResourceRef::new(
        CAPI_API_VERSION,
        "Cluster",
        namespace,
        &identity.name,
    ));

    let Some(config) = declared else {
        state
            .omitted
            .push("node groups and stacks (no cluster configuration given)".to_string());
        return state;
    };

    state.node_groups = config
        .node_groups
        .iter()
        .map(|ng| NodeGroupState {
            name: ng.name.clone(),
            resource: ResourceRef::new(CAPI_API_VERSION, "MachineDeployment", namespace, &ng.name),
            nodes: None,
        })
        .collect();
    state.stacks = config
        .stacks
        .iter()
        .map(|s| StackState {
            name: s.name.clone(),
            resource: ResourceRef::new(&s.api_version, &s.kind, namespace, &s.name),
            depends_on: s.depends_on.clone(),
        })
        .collect();
    if !state.node_groups.is_empty() {
        state
            .omitted
            .push("node group membership (nodes cannot be drained)".to_string());
    }
    state
}

/// Strips node membership from management state read without workload access
fn without_node_access(mut state: ClusterState) -> ClusterState {
    for group in &mut state.node_groups {
        group.nodes = None;
    }
    if !state.node_groups.is_empty() {
        state
            .omitted
            .push("node group membership (workload cluster API unreachable)".to_string());
    }
    state
}

/// Resolves clusters from CAPI objects in a management cluster
pub struct CapiClusterResolver {
    client: Client,
    declared: Option<ClusterConfig>,
}

impl CapiClusterResolver {
    /// Create a resolver for the management cluster behind `client`
    pub fn new(client: Client) -> Self {
        Self {
            client,
            declared: None,
        }
    }

    /// Declared configuration, used for extra stacks and as the degraded fallback
    pub fn with_declared(mut self, config: Option<ClusterConfig>) -> Self {
        self.declared = config;
        self
    }

    async fn node_groups(&self, identity: &ClusterIdentity) -> Result<Vec<NodeGroupState>> {
        let lp = ListParams::default().labels(&format!("{}={}", CLUSTER_NAME_LABEL, identity.name));
        let deployments = capi_api(&self.client, &identity.namespace, "MachineDeployment")
            .list(&lp)
            .await?;
        let machines = capi_api(&self.client, &identity.namespace, "Machine");

        let mut groups = Vec::new();
        for md in deployments.items {
            let Some(name) = md.metadata.name.clone() else {
                continue;
            };
            let lp = ListParams::default().labels(&format!("{}={}", DEPLOYMENT_NAME_LABEL, name));
            let nodes = machines
                .list(&lp)
                .await?
                .items
                .iter()
                .filter_map(|m| {
                    m.data
                        .pointer("/status/nodeRef/name")
                        .and_then(|n| n.as_str())
                        .map(str::to_string)
                })
                .collect::<Vec<_>>();
            debug!(node_group = %name, nodes = nodes.len(), "Discovered node group");
            groups.push(NodeGroupState {
                resource: ResourceRef::new(
                    CAPI_API_VERSION,
                    "MachineDeployment",
                    &identity.namespace,
                    &name,
                ),
                name,
                nodes: Some(nodes),
            });
        }
        Ok(groups)
    }

    async fn workload_drainer(&self, identity: &ClusterIdentity) -> Result<Arc<dyn NodeDrainer>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &identity.namespace);
        let secret_name = kubeconfig_secret_name(&identity.name);
        let secret = secrets.get(&secret_name).await?;
        let kubeconfig = secret
            .data
            .as_ref()
            .and_then(|d| d.get("value"))
            .ok_or_else(|| {
                Error::cluster_unreachable(
                    &identity.name,
                    format!("secret {} has no kubeconfig", secret_name),
                )
            })?;
        let yaml = String::from_utf8(kubeconfig.0.clone()).map_err(|e| {
            Error::cluster_unreachable(&identity.name, format!("kubeconfig is not UTF-8: {}", e))
        })?;
        let client = client_from_kubeconfig_yaml(&yaml).await?;
        Ok(Arc::new(KubeNodeDrainer::new(client)))
    }

    /// Reads the Cluster, its stacks and node groups from the management cluster
    async fn management_state(&self, identity: &ClusterIdentity) -> Result<ClusterState> {
        let clusters = &capi_api(&self.client, &identity.namespace, "Cluster");
        let name = identity.name.as_str();
        let cluster = retry_with_backoff_if(
            &RetryConfig::with_max_attempts(READ_ATTEMPTS),
            "get_cluster",
            || async move { clusters.get_opt(name).await.map_err(Error::from) },
            Error::is_retryable,
        )
        .await?
        .ok_or_else(|| {
            Error::cluster_unreachable(
                &identity.name,
                format!("no Cluster {} in namespace {}", identity.name, identity.namespace),
            )
        })?;

        let mut state = ClusterState::new(identity.name.clone(), StateSource::Live);
        state.cluster_record = Some(ResourceRef::new(
            CAPI_API_VERSION,
            "Cluster",
            &identity.namespace,
            &identity.name,
        ));

        let spec = cluster.data.get("spec");
        let infra = spec
            .and_then(|s| s.get("infrastructureRef"))
            .and_then(|r| object_ref(r, &identity.namespace));
        let control_plane = spec
            .and_then(|s| s.get("controlPlaneRef"))
            .and_then(|r| object_ref(r, &identity.namespace));

        // the control plane runs on the infrastructure cluster, so it goes first
        if let Some(cp) = control_plane {
            state.stacks.push(StackState {
                name: cp.name.clone(),
                depends_on: infra.iter().map(|i| i.name.clone()).collect(),
                resource: cp,
            });
        }
        if let Some(infra) = infra {
            state.stacks.push(StackState {
                name: infra.name.clone(),
                resource: infra,
                depends_on: Vec::new(),
            });
        }
        if let Some(config) = &self.declared {
            for stack in &config.stacks {
                if state
                    .stacks
                    .iter()
                    .any(|s| s.name == stack.name && s.resource.kind == stack.kind)
                {
                    continue;
                }
                state.stacks.push(StackState {
                    name: stack.name.clone(),
                    resource: ResourceRef::new(
                        &stack.api_version,
                        &stack.kind,
                        &identity.namespace,
                        &stack.name,
                    ),
                    depends_on: stack.depends_on.clone(),
                });
            }
        }

        state.node_groups = self.node_groups(identity).await?;
        Ok(state)
    }
}

#[async_trait]
impl ClusterResolver for CapiClusterResolver {
    #[instrument(skip(self), fields(cluster = %identity.name))]
    async fn resolve_live(&self, identity: &ClusterIdentity) -> Result<ClusterHandle> {
        let state = self.management_state(identity).await?;

        let drainer = self.workload_drainer(identity).await.map_err(|e| {
            Error::cluster_unreachable(&identity.name, format!("workload cluster API: {}", e))
        })?;

        info!(
            node_groups = state.node_groups.len(),
            stacks = state.stacks.len(),
            "Resolved live cluster state"
        );
        Ok(ClusterHandle::live(identity.clone(), state, drainer))
    }

    #[instrument(skip(self), fields(cluster = %identity.name))]
    async fn resolve_degraded(&self, identity: &ClusterIdentity) -> Result<ClusterHandle> {
        if let Some(config) = &self.declared {
            if config.metadata.name != identity.name {
                return Err(Error::validation(format!(
                    "configuration describes cluster {:?}, not {:?}",
                    config.metadata.name, identity.name
                )));
            }
        }
        let state = match self.management_state(identity).await {
            Ok(state) => {
                info!("Using management cluster state without node access");
                without_node_access(state)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Management cluster state unavailable, using declared configuration"
                );
                declared_state(identity, self.declared.as_ref())
            }
        };
        Ok(ClusterHandle::degraded(identity.clone(), state, None))
    }
}

/// Removes teardown units by deleting their CAPI objects
///
/// CAPI controllers release the cloud resources behind an object before its
/// finalizers let it go, so "object gone" means "infrastructure gone".
pub struct CapiInfrastructure {
    client: Client,
    poll_interval: Duration,
}

impl CapiInfrastructure {
    /// Create an infrastructure collaborator for the management cluster
    pub fn new(client: Client) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_REMOVAL_POLL_INTERVAL,
        }
    }

    /// CAPI won't delete a paused cluster
    async fn unpause(&self, resource: &ResourceRef) {
        let patch = serde_json::json!({"spec": {"paused": false}});
        match dynamic_api(&self.client, resource)
            .patch(&resource.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => debug!(cluster = %resource.name, "Cluster unpaused"),
            Err(e) if is_not_found(&e) => {}
            Err(e) => warn!(
                cluster = %resource.name,
                error = %e,
                "Failed to unpause cluster, deleting anyway"
            ),
        }
    }
}

#[async_trait]
impl Infrastructure for CapiInfrastructure {
    async fn remove_unit(&self, unit: &TeardownUnit) -> Result<()> {
        if unit.kind == UnitKind::ClusterRecord {
            self.unpause(&unit.resource).await;
        }

        match dynamic_api(&self.client, &unit.resource)
            .delete(&unit.resource.name, &DeleteParams::background())
            .await
        {
            Ok(_) => {
                info!(unit = %unit.resource, "Deletion initiated");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(unit = %unit.resource, "Already gone");
                Ok(())
            }
            Err(e) => Err(Error::removal_failed(unit.id(), e.to_string())),
        }
    }

    async fn await_removed(&self, unit: &TeardownUnit, timeout: Duration) -> Result<()> {
        let api = dynamic_api(&self.client, &unit.resource);
        let name = unit.resource.name.as_str();
        let gone = poll_until(timeout, self.poll_interval, || {
            let api = api.clone();
            async move {
                match api.get_opt(name).await {
                    Ok(Some(_)) => {
                        debug!(unit = %name, "Waiting for removal");
                        Ok(false)
                    }
                    Ok(None) => Ok(true),
                    Err(e) => Err(Error::from(e)),
                }
            }
        })
        .await;

        if gone {
            info!(unit = %unit.resource, "Removed");
            Ok(())
        } else {
            Err(Error::deletion_timed_out(unit.id(), timeout))
        }
    }
}
