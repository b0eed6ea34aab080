//! kube-rs backed [`NodeDrainer`]
//!
//! Follows `kubectl drain`: DaemonSet pods are left alone because the DaemonSet
//! controller ignores cordons, static mirror pods cannot be controlled, and
//! pods that already completed need no removal.

use async_trait::async_trait;
use decom_common::kube_utils::is_not_found;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{DeleteParams, EvictParams, ListParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, instrument};

use crate::drainer::{NodeDrainer, PodRef};
use crate::error::{DrainError, EvictionError};

const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

/// Drains nodes of a workload cluster through its API server
#[derive(Clone)]
pub struct KubeNodeDrainer {
    client: Client,
}

impl KubeNodeDrainer {
    /// Create a drainer for the cluster behind `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Whether a drain has to remove this pod
pub fn is_evictable(pod: &Pod) -> bool {
    let completed = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == "Succeeded" || phase == "Failed");
    if completed {
        return false;
    }

    let daemonset = pod
        .metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| {
            refs.iter()
                .any(|r| r.controller == Some(true) && r.kind == "DaemonSet")
        });
    if daemonset {
        debug!(pod = %pod.name_any(), "Skipping DaemonSet pod");
        return false;
    }

    let mirror = pod
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(MIRROR_POD_ANNOTATION));
    if mirror {
        debug!(pod = %pod.name_any(), "Skipping static mirror pod");
        return false;
    }

    true
}

#[async_trait]
impl NodeDrainer for KubeNodeDrainer {
    async fn cordon(&self, node: &str) -> Result<(), DrainError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        nodes
            .cordon(node)
            .await
            .map(|_| ())
            .map_err(|e| DrainError::Cordon {
                node: node.to_string(),
                message: e.to_string(),
            })
    }

    async fn list_evictable_pods(&self, node: &str) -> Result<Vec<PodRef>, DrainError> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let lp = ListParams::default().fields(&format!("spec.nodeName={}", node));
        let list = pods.list(&lp).await.map_err(|e| DrainError::ListPods {
            node: node.to_string(),
            message: e.to_string(),
        })?;

        Ok(list
            .items
            .iter()
            .filter(|pod| is_evictable(pod))
            .map(|pod| PodRef {
                uid: pod.uid(),
                ..PodRef::new(pod.namespace().unwrap_or_default(), pod.name_any())
            })
            .collect())
    }

    #[instrument(skip(self), fields(pod = %pod))]
    async fn evict_pod(&self, pod: &PodRef) -> Result<(), EvictionError> {
        match self
            .pods(&pod.namespace)
            .evict(&pod.name, &EvictParams::default())
            .await
        {
            Ok(_) => {
                info!("Evicted pod");
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            // 429: a disruption budget is not satisfied yet
            Err(kube::Error::Api(ae)) if ae.code == 429 => Err(EvictionError::BudgetBlocked {
                pod: pod.to_string(),
            }),
            // 500: usually several budgets selecting the same pod
            Err(kube::Error::Api(ae)) if ae.code == 500 => Err(EvictionError::Retryable {
                pod: pod.to_string(),
                message: ae.message,
            }),
            Err(kube::Error::Api(ae)) => Err(EvictionError::Fatal {
                pod: pod.to_string(),
                message: ae.message,
            }),
            Err(e) => Err(EvictionError::Retryable {
                pod: pod.to_string(),
                message: e.to_string(),
            }),
        }
    }

    #[instrument(skip(self), fields(pod = %pod))]
    async fn delete_pod(&self, pod: &PodRef) -> Result<(), DrainError> {
        match self
            .pods(&pod.namespace)
            .delete(&pod.name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                info!("Deleted pod");
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(DrainError::DeletePod {
                pod: pod.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn pod_exists(&self, pod: &PodRef) -> Result<bool, DrainError> {
        self.pods(&pod.namespace)
            .get_opt(&pod.name)
            .await
            .map(|found| found.is_some_and(|found| is_same_pod(pod, &found)))
            .map_err(|e| DrainError::PodLookup {
                pod: pod.to_string(),
                message: e.to_string(),
            })
    }
}

/// Unpinned references match any pod of the same name
fn is_same_pod(pod: &PodRef, found: &Pod) -> bool {
    match (&pod.uid, found.uid()) {
        (Some(expected), Some(actual)) => *expected == actual,
        _ => true,
    }
}
