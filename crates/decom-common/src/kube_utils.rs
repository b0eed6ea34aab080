//! Shared Kubernetes utilities using kube-rs

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use tokio::time::Instant;
use tracing::trace;

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path and context.
///
/// Without a path the config is inferred (`KUBECONFIG`, `~/.kube/config`, or
/// in-cluster).
pub async fn create_client(
    kubeconfig: Option<&Path>,
    context: Option<&str>,
) -> Result<Client, Error> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None if context.is_some() => Config::from_kubeconfig(&options).await.map_err(|e| {
            Error::internal_with_context(
                "create_client",
                format!("failed to load kubeconfig context: {}", e),
            )
        })?,
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };

    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Create a kube client from kubeconfig contents (e.g. a CAPI kubeconfig secret)
pub async fn client_from_kubeconfig_yaml(yaml: &str) -> Result<Client, Error> {
    let kubeconfig = Kubeconfig::from_yaml(yaml).map_err(|e| {
        Error::internal_with_context(
            "client_from_kubeconfig_yaml",
            format!("failed to parse kubeconfig: {}", e),
        )
    })?;
    let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| {
            Error::internal_with_context(
                "client_from_kubeconfig_yaml",
                format!("failed to load kubeconfig: {}", e),
            )
        })?;
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context(
            "client_from_kubeconfig_yaml",
            format!("failed to create client: {}", e),
        )
    })
}

/// True if the error is an API 404
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Split an apiVersion into (group, version); the core group is empty.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from a known apiVersion and kind.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Known Kubernetes/CAPI resource pluralizations
const KIND_PLURALS: &[(&str, &str)] = &[
    ("cluster", "clusters"),
    ("machine", "machines"),
    ("machinedeployment", "machinedeployments"),
    ("machineset", "machinesets"),
    ("machinepool", "machinepools"),
    ("kubeadmcontrolplane", "kubeadmcontrolplanes"),
    ("rke2controlplane", "rke2controlplanes"),
    ("awsmanagedcontrolplane", "awsmanagedcontrolplanes"),
    ("dockercluster", "dockerclusters"),
    ("awscluster", "awsclusters"),
    ("awsmanagedcluster", "awsmanagedclusters"),
    ("gcpcluster", "gcpclusters"),
    ("azurecluster", "azureclusters"),
    ("proxmoxcluster", "proxmoxclusters"),
    ("openstackcluster", "openstackclusters"),
    ("clusterclass", "clusterclasses"),
];

/// Pluralize a Kubernetes resource kind
///
/// Uses a lookup table for known CAPI types, falling back to simple English
/// rules.
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Poll until a condition holds or the timeout elapses.
///
/// `check_fn` returns `Ok(true)` when the condition is met. Check errors are
/// treated as "not yet" and polling continues. Returns `true` if the
/// condition was met and `false` on timeout.
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    mut check_fn: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let start = Instant::now();

    loop {
        match check_fn().await {
            Ok(true) => return true,
            Ok(false) => trace!("Polling condition not yet met"),
            Err(e) => trace!(error = %e, "Polling check returned error, retrying"),
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return false;
        }
        tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn api_version_split() {
        assert_eq!(
            parse_api_version("cluster.x-k8s.io/v1beta1"),
            ("cluster.x-k8s.io".to_string(), "v1beta1".to_string())
        );
        assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
    }

    #[test]
    fn api_resource_for_capi_kind() {
        let ar = build_api_resource("cluster.x-k8s.io/v1beta1", "MachineDeployment");
        assert_eq!(ar.group, "cluster.x-k8s.io");
        assert_eq!(ar.version, "v1beta1");
        assert_eq!(ar.plural, "machinedeployments");
    }

    #[test]
    fn pluralization() {
        assert_eq!(pluralize_kind("ClusterClass"), "clusterclasses");
        assert_eq!(pluralize_kind("AWSCluster"), "awsclusters");
        assert_eq!(pluralize_kind("Policy"), "policies");
        assert_eq!(pluralize_kind("Gateway"), "gateways");
        assert_eq!(pluralize_kind("ConfigMap"), "configmaps");
    }

    #[tokio::test]
    async fn poll_until_returns_when_condition_met() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let met = poll_until(Duration::from_secs(5), Duration::from_millis(1), || {
            let c = c.clone();
            async move { Ok(c.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await;
        assert!(met);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_until_times_out() {
        let met = poll_until(Duration::from_millis(20), Duration::from_millis(5), || async {
            Err(Error::internal("still there"))
        })
        .await;
        assert!(!met);
    }
}
