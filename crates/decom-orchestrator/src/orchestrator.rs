//! The deletion state machine

use std::sync::Arc;

use decom_common::{ClusterIdentity, DeletionRequest, Error, Result};
use decom_drain::{DrainConfig, DrainCoordinator};
use decom_plan::{PlanOutput, TeardownPlanner, TeardownUnit, UnitKind};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::handle::ClusterHandle;
use crate::infra::Infrastructure;
use crate::outcome::DeletionOutcome;
use crate::resolver::ClusterResolver;

/// Tears down a cluster and its dependent infrastructure
pub struct DeletionOrchestrator {
    resolver: Arc<dyn ClusterResolver>,
    infra: Arc<dyn Infrastructure>,
    planner: TeardownPlanner,
    drain_config: DrainConfig,
}

impl DeletionOrchestrator {
    /// Create an orchestrator with default drain tunables
    pub fn new(resolver: Arc<dyn ClusterResolver>, infra: Arc<dyn Infrastructure>) -> Self {
        Self {
            resolver,
            infra,
            planner: TeardownPlanner,
            drain_config: DrainConfig::default(),
        }
    }

    /// Override drain tunables
    pub fn with_drain_config(mut self, config: DrainConfig) -> Self {
        self.drain_config = config;
        self
    }

    /// Delete a cluster.
    ///
    /// Fails with `ClusterUnreachable` before touching anything if live
    /// state cannot be read and `force` is off. Otherwise returns the
    /// outcome; a run stopped by a failure reports `Failed` and keeps the
    /// stopping error (see [`DeletionOutcome::into_result`]).
    #[instrument(
        skip(self, request),
        fields(cluster = %identity.name, force = request.force(), wait = request.wait())
    )]
    pub async fn delete(
        &self,
        identity: &ClusterIdentity,
        request: &DeletionRequest,
    ) -> Result<DeletionOutcome> {
        let handle = self.resolve(identity, request.force()).await?;

        let PlanOutput { plan, warnings } = self.planner.plan(handle.state())?;
        for warning in &warnings {
            warn!(kind = %warning.kind, "{}", warning.message);
        }
        info!(units = plan.len(), degraded = handle.is_degraded(), "Deleting cluster");

        let mut outcome = DeletionOutcome::new(identity.name.clone(), warnings);
        let mut started: Option<Instant> = None;

        for unit in plan.iter() {
            let id = unit.id();
            if let Some(dependent) = plan
                .dependents_of(&id)
                .iter()
                .find(|d| outcome.is_failed(d))
            {
                warn!(
                    unit = %id,
                    dependent = %dependent,
                    "Skipping unit, a dependent was not removed"
                );
                outcome.record_blocked(unit, dependent);
                continue;
            }

            match self.teardown_unit(&handle, unit, request, &mut started).await {
                Ok(()) => {
                    info!(unit = %id, "Removed {}", unit.kind);
                    outcome.record_removed(unit);
                }
                Err(e) if request.force() => {
                    warn!(unit = %id, error = %e, "Unit failed, continuing because force is set");
                    outcome.record_failure(unit, &e);
                }
                Err(e) => {
                    error!(unit = %id, error = %e, "Unit failed, stopping");
                    outcome.abort(unit, e);
                    break;
                }
            }
        }

        info!(
            status = %outcome.status(),
            removed = outcome.removed.len(),
            failed = outcome.failed.len(),
            "Cluster deletion finished"
        );
        Ok(outcome)
    }

    async fn resolve(&self, identity: &ClusterIdentity, force: bool) -> Result<ClusterHandle> {
        match self.resolver.resolve_live(identity).await {
            Ok(handle) => Ok(handle),
            Err(e) if !force => Err(match e {
                e @ Error::ClusterUnreachable { .. } => e,
                other => Error::cluster_unreachable(&identity.name, other.to_string()),
            }),
            Err(e) => {
                warn!(
                    error = %e,
                    "Continuing with deletion without live cluster state because force is set"
                );
                self.resolver.resolve_degraded(identity).await
            }
        }
    }

    async fn teardown_unit(
        &self,
        handle: &ClusterHandle,
        unit: &TeardownUnit,
        request: &DeletionRequest,
        started: &mut Option<Instant>,
    ) -> Result<()> {
        if unit.kind == UnitKind::NodeGroup {
            self.drain(handle, unit, request).await?;
        }

        // the wait budget covers the whole run, starting at the first removal
        let started = *started.get_or_insert_with(Instant::now);

        self.infra.remove_unit(unit).await.map_err(|e| match e {
            e @ Error::RemovalFailed { .. } => e,
            other => Error::removal_failed(unit.id(), other.to_string()),
        })?;

        if !request.wait() {
            return Ok(());
        }

        let remaining = request.timeout().saturating_sub(started.elapsed());
        debug!(unit = %unit.id(), remaining_secs = remaining.as_secs(), "Waiting for removal");
        self.infra
            .await_removed(unit, remaining)
            .await
            .map_err(|e| match e {
                Error::DeletionTimedOut { .. } => {
                    Error::deletion_timed_out(unit.id(), request.timeout())
                }
                e @ Error::RemovalFailed { .. } => e,
                other => Error::removal_failed(unit.id(), other.to_string()),
            })
    }

    async fn drain(
        &self,
        handle: &ClusterHandle,
        unit: &TeardownUnit,
        request: &DeletionRequest,
    ) -> Result<()> {
        let group = handle.node_group(&unit.name);
        if group.nodes.is_empty() {
            debug!(node_group = %unit.name, "No known member nodes, nothing to drain");
            return Ok(());
        }

        let drainer = handle.drainer().ok_or_else(|| {
            Error::drain_failed(&unit.name, "no access to the cluster's nodes")
        })?;

        let result = DrainCoordinator::new(drainer.clone(), self.drain_config.clone())
            .drain(&group, request.parallel(), request.use_eviction())
            .await;

        if result.is_drained() {
            Ok(())
        } else {
            Err(Error::drain_failed(&unit.name, result.failure_summary()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MockInfrastructure;
    use crate::outcome::{DeletionStatus, FailureKind};
    use crate::resolver::MockClusterResolver;
    use async_trait::async_trait;
    use decom_common::retry::RetryConfig;
    use decom_common::ResourceRef;
    use decom_drain::{DrainError, EvictionError, NodeDrainer, PodRef};
    use decom_plan::{ClusterState, NodeGroupState, StackState, StateSource};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Drainer that records concurrency and can refuse evictions on some nodes
    #[derive(Default)]
    struct FakeDrainer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        budget_blocked: HashSet<String>,
        drained: Mutex<Vec<String>>,
    }

    impl FakeDrainer {
        fn blocking(nodes: &[&str]) -> Self {
            Self {
                budget_blocked: nodes.iter().map(|n| n.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl NodeDrainer for FakeDrainer {
        async fn cordon(&self, _node: &str) -> std::result::Result<(), DrainError> {
            Ok(())
        }

        async fn list_evictable_pods(
            &self,
            node: &str,
        ) -> std::result::Result<Vec<PodRef>, DrainError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![PodRef::new("default", node)])
        }

        async fn evict_pod(&self, pod: &PodRef) -> std::result::Result<(), EvictionError> {
            if self.budget_blocked.contains(&pod.name) {
                return Err(EvictionError::BudgetBlocked {
                    pod: pod.to_string(),
                });
            }
            self.drained.lock().unwrap().push(pod.name.clone());
            Ok(())
        }

        async fn delete_pod(&self, pod: &PodRef) -> std::result::Result<(), DrainError> {
            self.drained.lock().unwrap().push(pod.name.clone());
            Ok(())
        }

        async fn pod_exists(&self, _pod: &PodRef) -> std::result::Result<bool, DrainError> {
            Ok(false)
        }
    }

    fn fast_drain() -> DrainConfig {
        DrainConfig {
            eviction_retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                backoff_multiplier: 2.0,
            },
            poll_interval: Duration::from_millis(1),
            pod_removal_timeout: Duration::from_millis(20),
            pod_concurrency: 2,
        }
    }

    fn identity() -> ClusterIdentity {
        ClusterIdentity::new("prod").with_region("us-west-2")
    }

    fn node_group(name: &str, nodes: usize) -> NodeGroupState {
        NodeGroupState {
            name: name.to_string(),
            resource: ResourceRef::new(
                "cluster.x-k8s.io/v1beta1",
                "MachineDeployment",
                "capi-prod",
                name,
            ),
            nodes: Some((0..nodes).map(|i| format!("{}-{}", name, i)).collect()),
        }
    }

    fn cluster_record() -> ResourceRef {
        ResourceRef::new("cluster.x-k8s.io/v1beta1", "Cluster", "capi-prod", "prod")
    }

    /// Two node groups of four nodes, one stack, the cluster record
    fn live_state() -> ClusterState {
        let mut state = ClusterState::new("prod", StateSource::Live);
        state.node_groups = vec![node_group("workers", 4), node_group("gpu", 4)];
        state.stacks = vec![StackState {
            name: "prod".to_string(),
            resource: ResourceRef::new(
                "infrastructure.cluster.x-k8s.io/v1beta2",
                "AWSCluster",
                "capi-prod",
                "prod",
            ),
            depends_on: Vec::new(),
        }];
        state.cluster_record = Some(cluster_record());
        state
    }

    fn live_resolver(drainer: Arc<FakeDrainer>) -> MockClusterResolver {
        let mut resolver = MockClusterResolver::new();
        resolver.expect_resolve_live().returning(move |id| {
            Ok(ClusterHandle::live(id.clone(), live_state(), drainer.clone()))
        });
        resolver.expect_resolve_degraded().never();
        resolver
    }

    /// Infrastructure that records removal order and fails selected units
    fn recording_infra(
        removed: Arc<Mutex<Vec<String>>>,
        failing: &'static [&'static str],
    ) -> MockInfrastructure {
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().returning(move |unit| {
            if failing.contains(&unit.id().as_str()) {
                return Err(Error::removal_failed(unit.id(), "rejected by provider"));
            }
            removed.lock().unwrap().push(unit.id());
            Ok(())
        });
        infra.expect_await_removed().returning(|_, _| Ok(()));
        infra
    }

    fn request(force: bool, parallel: usize) -> DeletionRequest {
        DeletionRequest::builder()
            .force(force)
            .parallel(parallel)
            .build()
            .unwrap()
    }

    fn orchestrator(
        resolver: MockClusterResolver,
        infra: MockInfrastructure,
    ) -> DeletionOrchestrator {
        DeletionOrchestrator::new(Arc::new(resolver), Arc::new(infra))
            .with_drain_config(fast_drain())
    }

    // =========================================================================
    // Scenarios
    // =========================================================================

    #[tokio::test]
    async fn all_units_removed_when_everything_succeeds() {
        let drainer = Arc::new(FakeDrainer::default());
        let removed = Arc::new(Mutex::new(Vec::new()));
        let orch = orchestrator(
            live_resolver(drainer.clone()),
            recording_infra(removed.clone(), &[]),
        );

        let outcome = orch.delete(&identity(), &request(false, 4)).await.unwrap();

        assert_eq!(outcome.status(), DeletionStatus::Succeeded);
        assert!(outcome.failed.is_empty());
        assert_eq!(
            outcome.removed,
            vec![
                "MachineDeployment/gpu",
                "MachineDeployment/workers",
                "AWSCluster/prod",
                "Cluster/prod",
            ]
        );
        assert_eq!(*removed.lock().unwrap(), outcome.removed);
        assert!(drainer.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(drainer.drained.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn unreachable_without_force_fails_before_mutation() {
        let mut resolver = MockClusterResolver::new();
        resolver
            .expect_resolve_live()
            .returning(|id| Err(Error::internal(format!("cluster {} not found", id.name))));
        resolver.expect_resolve_degraded().never();
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().never();
        infra.expect_await_removed().never();

        let err = orchestrator(resolver, infra)
            .delete(&identity(), &request(false, 1))
            .await
            .unwrap_err();

        match err {
            Error::ClusterUnreachable { cluster, message } => {
                assert_eq!(cluster, "prod");
                assert!(message.contains("not found"));
            }
            other => panic!("expected ClusterUnreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_with_force_proceeds_on_degraded_plan() {
        let mut resolver = MockClusterResolver::new();
        resolver
            .expect_resolve_live()
            .returning(|id| Err(Error::cluster_unreachable(&id.name, "not found")));
        resolver.expect_resolve_degraded().times(1).returning(|id| {
            let mut state = ClusterState::new("prod", StateSource::Declared);
            state.node_groups = vec![NodeGroupState {
                nodes: None,
                ..node_group("workers", 0)
            }];
            state.cluster_record = Some(cluster_record());
            Ok(ClusterHandle::degraded(id.clone(), state, None))
        });
        let removed = Arc::new(Mutex::new(Vec::new()));

        let outcome = orchestrator(resolver, recording_infra(removed.clone(), &[]))
            .delete(&identity(), &request(true, 1))
            .await
            .unwrap();

        assert_eq!(outcome.status(), DeletionStatus::Succeeded);
        assert_eq!(
            *removed.lock().unwrap(),
            vec!["MachineDeployment/workers", "Cluster/prod"]
        );
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn degraded_resolution_failure_is_returned() {
        let mut resolver = MockClusterResolver::new();
        resolver
            .expect_resolve_live()
            .returning(|id| Err(Error::cluster_unreachable(&id.name, "not found")));
        resolver
            .expect_resolve_degraded()
            .returning(|_| Err(Error::config("cluster.yaml", "unreadable")));
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().never();

        let err = orchestrator(resolver, infra)
            .delete(&identity(), &request(true, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn budget_blocked_group_is_kept_and_siblings_continue_under_force() {
        let drainer = Arc::new(FakeDrainer::blocking(&["workers-2"]));
        let removed = Arc::new(Mutex::new(Vec::new()));
        let orch = orchestrator(
            live_resolver(drainer.clone()),
            recording_infra(removed.clone(), &[]),
        );

        let outcome = orch.delete(&identity(), &request(true, 4)).await.unwrap();

        assert_eq!(outcome.status(), DeletionStatus::PartialFailure);
        // the blocked group's infrastructure is never removed
        assert!(!removed
            .lock()
            .unwrap()
            .contains(&"MachineDeployment/workers".to_string()));
        assert!(outcome.is_removed("MachineDeployment/gpu"));

        let failed: Vec<(&str, FailureKind)> = outcome
            .failed
            .iter()
            .map(|f| (f.unit.as_str(), f.kind))
            .collect();
        assert_eq!(
            failed,
            vec![
                ("MachineDeployment/workers", FailureKind::DrainFailed),
                ("AWSCluster/prod", FailureKind::Blocked),
                ("Cluster/prod", FailureKind::Blocked),
            ]
        );
        assert!(outcome.failed.iter().all(|f| !f.reason.is_empty()));
        assert!(outcome.failed[0].reason.contains("workers-2"));
    }

    #[tokio::test]
    async fn failed_drain_blocks_same_named_stacks() {
        let drainer = Arc::new(FakeDrainer::blocking(&["workers-1"]));
        let mut resolver = MockClusterResolver::new();
        resolver.expect_resolve_live().returning(move |id| {
            let mut state = ClusterState::new("prod", StateSource::Live);
            state.node_groups = vec![node_group("workers", 2)];
            state.stacks = vec![
                StackState {
                    name: "prod".to_string(),
                    resource: ResourceRef::new(
                        "controlplane.cluster.x-k8s.io/v1beta1",
                        "KubeadmControlPlane",
                        "capi-prod",
                        "prod",
                    ),
                    depends_on: vec!["prod".to_string()],
                },
                StackState {
                    name: "prod".to_string(),
                    resource: ResourceRef::new(
                        "infrastructure.cluster.x-k8s.io/v1beta2",
                        "AWSCluster",
                        "capi-prod",
                        "prod",
                    ),
                    depends_on: Vec::new(),
                },
            ];
            state.cluster_record = Some(cluster_record());
            Ok(ClusterHandle::live(id.clone(), state, drainer.clone()))
        });
        let removed = Arc::new(Mutex::new(Vec::new()));

        let outcome = orchestrator(resolver, recording_infra(removed.clone(), &[]))
            .delete(&identity(), &request(true, 2))
            .await
            .unwrap();

        assert!(removed.lock().unwrap().is_empty());
        let failed: Vec<(&str, FailureKind)> = outcome
            .failed
            .iter()
            .map(|f| (f.unit.as_str(), f.kind))
            .collect();
        assert_eq!(
            failed,
            vec![
                ("MachineDeployment/workers", FailureKind::DrainFailed),
                ("KubeadmControlPlane/prod", FailureKind::Blocked),
                ("AWSCluster/prod", FailureKind::Blocked),
                ("Cluster/prod", FailureKind::Blocked),
            ]
        );
    }

    #[tokio::test]
    async fn drain_failure_without_force_stops_the_run() {
        let drainer = Arc::new(FakeDrainer::blocking(&["gpu-0"]));
        let removed = Arc::new(Mutex::new(Vec::new()));
        let orch = orchestrator(
            live_resolver(drainer.clone()),
            recording_infra(removed.clone(), &[]),
        );

        let outcome = orch.delete(&identity(), &request(false, 2)).await.unwrap();

        assert_eq!(outcome.status(), DeletionStatus::Failed);
        assert!(removed.lock().unwrap().is_empty());
        assert!(outcome.removed.is_empty());
        // workers (after gpu in plan order) was never drained
        assert!(!drainer
            .drained
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.starts_with("workers")));
        assert!(matches!(
            outcome.into_result(),
            Err(Error::DrainFailed { node_group, .. }) if node_group == "gpu"
        ));
    }

    #[tokio::test]
    async fn removal_failure_without_force_attempts_nothing_after() {
        let drainer = Arc::new(FakeDrainer::default());
        let removed = Arc::new(Mutex::new(Vec::new()));
        let orch = orchestrator(
            live_resolver(drainer),
            recording_infra(removed.clone(), &["MachineDeployment/workers"]),
        );

        let outcome = orch.delete(&identity(), &request(false, 1)).await.unwrap();

        assert_eq!(outcome.status(), DeletionStatus::Failed);
        assert_eq!(*removed.lock().unwrap(), vec!["MachineDeployment/gpu"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].kind, FailureKind::RemovalFailed);
        assert!(matches!(
            outcome.abort_cause(),
            Some(Error::RemovalFailed { .. })
        ));
    }

    #[tokio::test]
    async fn removal_failure_with_force_attempts_independent_units() {
        let drainer = Arc::new(FakeDrainer::default());
        let removed = Arc::new(Mutex::new(Vec::new()));
        let orch = orchestrator(
            live_resolver(drainer),
            recording_infra(removed.clone(), &["MachineDeployment/gpu"]),
        );

        let outcome = orch.delete(&identity(), &request(true, 2)).await.unwrap();

        assert_eq!(outcome.status(), DeletionStatus::PartialFailure);
        assert_eq!(*removed.lock().unwrap(), vec!["MachineDeployment/workers"]);
        let failed: Vec<&str> = outcome.failed.iter().map(|f| f.unit.as_str()).collect();
        assert_eq!(
            failed,
            vec!["MachineDeployment/gpu", "AWSCluster/prod", "Cluster/prod"]
        );
    }

    #[tokio::test]
    async fn drain_completes_before_removal() {
        let drainer = Arc::new(FakeDrainer::default());
        let d = drainer.clone();
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().returning(move |unit| {
            if unit.kind == UnitKind::NodeGroup {
                let drained = d.drained.lock().unwrap();
                let prefix = format!("{}-", unit.name);
                assert_eq!(drained.iter().filter(|p| p.starts_with(&prefix)).count(), 4);
            }
            Ok(())
        });
        infra.expect_await_removed().never();

        let outcome = orchestrator(live_resolver(drainer), infra)
            .delete(&identity(), &request(false, 3))
            .await
            .unwrap();
        assert_eq!(outcome.status(), DeletionStatus::Succeeded);
    }

    #[tokio::test]
    async fn wait_timeout_is_reported_and_blocks_dependencies() {
        let drainer = Arc::new(FakeDrainer::default());
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().returning(|_| Ok(()));
        infra.expect_await_removed().returning(|unit, timeout| {
            if unit.kind == UnitKind::SupportingStack {
                Err(Error::deletion_timed_out(unit.id(), timeout))
            } else {
                Ok(())
            }
        });
        let request = DeletionRequest::builder()
            .force(true)
            .wait(true)
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        let outcome = orchestrator(live_resolver(drainer), infra)
            .delete(&identity(), &request)
            .await
            .unwrap();

        assert_eq!(outcome.status(), DeletionStatus::PartialFailure);
        assert_eq!(outcome.failed[0].unit, "AWSCluster/prod");
        assert_eq!(outcome.failed[0].kind, FailureKind::DeletionTimedOut);
        assert!(outcome.failed[0].reason.contains("60s"));
        assert_eq!(outcome.failed[1].kind, FailureKind::Blocked);
        assert_eq!(outcome.removed.len(), 2);
    }

    #[tokio::test]
    async fn wait_uses_one_deadline_for_the_run() {
        let drainer = Arc::new(FakeDrainer::default());
        let budgets = Arc::new(Mutex::new(Vec::new()));
        let b = budgets.clone();
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().returning(|_| Ok(()));
        infra.expect_await_removed().returning(move |_, timeout| {
            b.lock().unwrap().push(timeout);
            Ok(())
        });
        let request = DeletionRequest::builder()
            .wait(true)
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap();

        orchestrator(live_resolver(drainer), infra)
            .delete(&identity(), &request)
            .await
            .unwrap();

        let budgets = budgets.lock().unwrap();
        assert_eq!(budgets.len(), 4);
        assert!(budgets.iter().all(|t| *t <= Duration::from_secs(600)));
        assert!(budgets.windows(2).all(|w| w[1] <= w[0]));
    }

    #[tokio::test]
    async fn unbounded_timeout_is_accepted() {
        let drainer = Arc::new(FakeDrainer::default());
        let budgets = Arc::new(Mutex::new(Vec::new()));
        let b = budgets.clone();
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().returning(|_| Ok(()));
        infra.expect_await_removed().returning(move |_, timeout| {
            b.lock().unwrap().push(timeout);
            Ok(())
        });
        let request = DeletionRequest::builder()
            .wait(true)
            .timeout(Duration::MAX)
            .build()
            .unwrap();

        let outcome = orchestrator(live_resolver(drainer), infra)
            .delete(&identity(), &request)
            .await
            .unwrap();

        assert_eq!(outcome.status(), DeletionStatus::Succeeded);
        let budgets = budgets.lock().unwrap();
        assert_eq!(budgets.len(), 4);
        assert!(budgets.iter().all(|t| *t > Duration::from_secs(u32::MAX as u64)));
    }

    #[tokio::test]
    async fn unbounded_timeout_without_wait_is_ignored() {
        let drainer = Arc::new(FakeDrainer::default());
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().times(4).returning(|_| Ok(()));
        infra.expect_await_removed().never();
        let request = DeletionRequest::builder()
            .force(true)
            .timeout(Duration::MAX)
            .build()
            .unwrap();

        let outcome = orchestrator(live_resolver(drainer), infra)
            .delete(&identity(), &request)
            .await
            .unwrap();
        assert_eq!(outcome.status(), DeletionStatus::Succeeded);
    }

    #[tokio::test]
    async fn without_wait_removals_are_not_awaited() {
        let drainer = Arc::new(FakeDrainer::default());
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().times(4).returning(|_| Ok(()));
        infra.expect_await_removed().never();

        let outcome = orchestrator(live_resolver(drainer), infra)
            .delete(&identity(), &request(false, 1))
            .await
            .unwrap();
        assert_eq!(outcome.removed.len(), 4);
    }

    #[tokio::test]
    async fn disabled_eviction_deletes_pods_despite_budgets() {
        let drainer = Arc::new(FakeDrainer::blocking(&["workers-2"]));
        let removed = Arc::new(Mutex::new(Vec::new()));
        let request = DeletionRequest::builder()
            .disable_nodegroup_eviction(true)
            .parallel(4)
            .build()
            .unwrap();

        let outcome = orchestrator(live_resolver(drainer), recording_infra(removed, &[]))
            .delete(&identity(), &request)
            .await
            .unwrap();
        assert_eq!(outcome.status(), DeletionStatus::Succeeded);
    }

    #[tokio::test]
    async fn nodes_without_drainer_fail_the_drain() {
        let mut resolver = MockClusterResolver::new();
        resolver
            .expect_resolve_live()
            .returning(|_| Err(Error::cluster_unreachable("prod", "no kubeconfig secret")));
        resolver.expect_resolve_degraded().returning(|id| {
            let mut state = ClusterState::new("prod", StateSource::Declared);
            state.node_groups = vec![node_group("workers", 2)];
            Ok(ClusterHandle::degraded(id.clone(), state, None))
        });
        let mut infra = MockInfrastructure::new();
        infra.expect_remove_unit().never();

        let outcome = orchestrator(resolver, infra)
            .delete(&identity(), &request(true, 1))
            .await
            .unwrap();
        assert_eq!(outcome.failed[0].kind, FailureKind::DrainFailed);
    }
}
