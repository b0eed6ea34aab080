//! `decom delete cluster` - tear down a cluster and its infrastructure
//!
//! Usage: decom delete cluster <NAME> [--wait] [--force] [--parallel N]
//!
//! 1. Resolve the target from the name or a config file
//! 2. Read the cluster's CAPI objects from the management cluster
//! 3. Drain each node group, then delete its MachineDeployment
//! 4. Delete the control plane and infrastructure cluster, then the Cluster
//! 5. With --wait, block until each object is gone

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use decom_common::kube_utils::create_client;
use decom_common::{DeletionRequest, DrainLimits, DEFAULT_MAX_PARALLEL};
use decom_orchestrator::{
    CapiClusterResolver, CapiInfrastructure, DeletionOrchestrator, DeletionStatus,
};
use tracing::info;

use super::format::print_outcome;
use super::metadata::load_cluster_metadata;
use crate::commands::{parse_duration, CommandErrorExt, OutputFormat};
use crate::{Error, Result};

/// Delete a cluster
#[derive(Args, Debug)]
pub struct DeleteClusterArgs {
    /// Name of the cluster to delete
    pub cluster: Option<String>,

    /// Name of the cluster to delete (alternative to the positional argument)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Region the cluster runs in
    #[arg(long)]
    pub region: Option<String>,

    /// Cluster configuration file; supplies name, region and declared resources
    #[arg(short = 'f', long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Wait for every deletion to be confirmed
    #[arg(short = 'w', long)]
    pub wait: bool,

    /// Keep deleting past failures and without live cluster state
    #[arg(long)]
    pub force: bool,

    /// Delete pods directly instead of evicting them (ignores disruption budgets)
    #[arg(long)]
    pub disable_nodegroup_eviction: bool,

    /// Number of nodes drained in parallel within a node group
    #[arg(long, default_value_t = 1)]
    pub parallel: usize,

    /// Upper bound accepted for --parallel
    #[arg(long, env = "DECOM_MAX_PARALLEL", default_value_t = DEFAULT_MAX_PARALLEL)]
    pub max_parallel: usize,

    /// Bound on waiting for deletions, e.g. 90s, 25m, 1h
    #[arg(long, default_value = "25m", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Path to the management cluster kubeconfig (default: $KUBECONFIG or ~/.kube/config)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context of the management cluster
    #[arg(long)]
    pub context: Option<String>,

    /// Namespace holding the cluster's CAPI objects (default: capi-<name>)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub output: OutputFormat,
}

impl DeleteClusterArgs {
    fn request(&self) -> Result<DeletionRequest> {
        let request = DeletionRequest::builder()
            .force(self.force)
            .disable_nodegroup_eviction(self.disable_nodegroup_eviction)
            .parallel(self.parallel)
            .wait(self.wait)
            .timeout(self.timeout)
            .limits(DrainLimits {
                max_parallel: self.max_parallel,
            })
            .build()?;
        Ok(request)
    }
}

/// Run `decom delete cluster`
pub async fn run(args: DeleteClusterArgs) -> Result<()> {
    let (identity, declared) = load_cluster_metadata(&args)?;
    let request = args.request()?;

    info!(cluster = %identity, "Deleting cluster");

    let client = create_client(args.kubeconfig.as_deref(), identity.context.as_deref())
        .await
        .cmd_err()?;

    let resolver = CapiClusterResolver::new(client.clone()).with_declared(declared);
    let infra = CapiInfrastructure::new(client);
    let orchestrator = DeletionOrchestrator::new(Arc::new(resolver), Arc::new(infra));

    let outcome = orchestrator.delete(&identity, &request).await?;
    print_outcome(&outcome, &args.output)?;

    // a stopped run carries the error that stopped it
    let outcome = outcome.into_result()?;
    if outcome.status() == DeletionStatus::PartialFailure {
        return Err(Error::command_failed(format!(
            "{} of {} unit(s) of {} could not be deleted",
            outcome.failed.len(),
            outcome.failed.len() + outcome.removed.len(),
            identity.name
        )));
    }

    info!(cluster = %identity, "All cluster resources were deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: DeleteClusterArgs,
    }

    fn parse(argv: &[&str]) -> DeleteClusterArgs {
        let mut full = vec!["decom"];
        full.extend_from_slice(argv);
        TestCli::parse_from(full).args
    }

    #[test]
    fn defaults() {
        let args = parse(&["prod"]);
        assert!(!args.wait);
        assert!(!args.force);
        assert!(!args.disable_nodegroup_eviction);
        assert_eq!(args.parallel, 1);
        assert_eq!(args.timeout, Duration::from_secs(25 * 60));
    }

    #[test]
    fn flags_build_request() {
        let args = parse(&[
            "prod",
            "--wait",
            "--force",
            "--disable-nodegroup-eviction",
            "--parallel",
            "8",
            "--timeout",
            "10m",
            "--max-parallel",
            "25",
        ]);
        let request = args.request().unwrap();
        assert!(request.wait());
        assert!(request.force());
        assert!(!request.use_eviction());
        assert_eq!(request.parallel(), 8);
        assert_eq!(request.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn parallel_above_ceiling_is_rejected() {
        let args = parse(&["prod", "--parallel", "26", "--max-parallel", "25"]);
        assert!(matches!(
            args.request(),
            Err(Error::Decom(decom_common::Error::Validation { .. }))
        ));
    }

    #[test]
    fn ceiling_can_be_raised() {
        let args = parse(&["prod", "--parallel", "40", "--max-parallel", "50"]);
        assert_eq!(args.request().unwrap().parallel(), 40);
    }

    #[test]
    fn bad_timeout_fails_parsing() {
        let result = TestCli::try_parse_from(["decom", "prod", "--timeout", "soon"]);
        assert!(result.is_err());
    }
}
