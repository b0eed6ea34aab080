//! Teardown planning
//!
//! Computes the removal order with Kahn's algorithm over the "dependents
//! first" relation:
//! 1. Find all units whose dependents are already placed
//! 2. Sort them by kind, then name, and append them as one level
//! 3. Repeat until every unit is placed
//!
//! If a pass places nothing, the remaining units form a cycle.

use std::collections::{BTreeSet, HashMap, HashSet};

use decom_common::{Error, ErrorKind, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::plan::{TeardownPlan, TeardownUnit, UnitKind};
use crate::state::ClusterState;

/// A non-fatal planning finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanWarning {
    /// Always [`ErrorKind::PlanningIncomplete`] today
    pub kind: ErrorKind,
    /// What was left out and why
    pub message: String,
}

impl PlanWarning {
    fn incomplete(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::PlanningIncomplete,
            message: message.into(),
        }
    }
}

/// A plan plus the warnings raised while computing it
#[derive(Debug, Clone)]
pub struct PlanOutput {
    /// Units in removal order
    pub plan: TeardownPlan,
    /// Warnings (degraded state, omitted resources)
    pub warnings: Vec<PlanWarning>,
}

/// Computes teardown plans
#[derive(Debug, Clone, Copy, Default)]
pub struct TeardownPlanner;

impl TeardownPlanner {
    /// Plan the removal of everything in `state`
    ///
    /// Node groups depend on every stack and on the cluster record; stacks
    /// depend on the cluster record and on their declared `depends_on`
    /// stacks. Unknown dependencies are ignored. A degraded state yields a
    /// `PlanningIncomplete` warning rather than an error.
    pub fn plan(&self, state: &ClusterState) -> Result<PlanOutput> {
        let mut warnings = Vec::new();
        if state.is_degraded() {
            warn!(
                cluster = %state.cluster,
                "Planning from declared configuration, resources that cannot be discovered are omitted"
            );
            warnings.push(PlanWarning::incomplete(format!(
                "live state of {} unavailable, plan built from declared configuration",
                state.cluster
            )));
        }
        for omitted in &state.omitted {
            warnings.push(PlanWarning::incomplete(format!("omitted {}", omitted)));
        }

        let units = build_units(state);
        let plan = order_units(&state.cluster, units)?;

        info!(
            cluster = %state.cluster,
            units = plan.len(),
            warnings = warnings.len(),
            "Computed teardown plan"
        );
        Ok(PlanOutput { plan, warnings })
    }
}

fn build_units(state: &ClusterState) -> Vec<TeardownUnit> {
    let record = state.cluster_record.as_ref().map(|r| {
        TeardownUnit::new(r.name.clone(), UnitKind::ClusterRecord, r.clone())
    });
    let record_id = record.as_ref().map(TeardownUnit::id);

    let stack_ids: Vec<String> = state
        .stacks
        .iter()
        .map(|s| {
            TeardownUnit::new(s.name.clone(), UnitKind::SupportingStack, s.resource.clone()).id()
        })
        .collect();

    // Stacks of different kinds may share a name, so a name can resolve to
    // several units
    let mut ids_by_name: HashMap<&str, Vec<&str>> = HashMap::new();
    for (stack, id) in state.stacks.iter().zip(&stack_ids) {
        ids_by_name
            .entry(stack.name.as_str())
            .or_default()
            .push(id.as_str());
    }

    let mut units = Vec::new();

    for ng in &state.node_groups {
        let mut unit =
            TeardownUnit::new(ng.name.clone(), UnitKind::NodeGroup, ng.resource.clone());
        unit.depends_on.extend(stack_ids.iter().cloned());
        unit.depends_on.extend(record_id.clone());
        units.push(unit);
    }

    for (stack, own_id) in state.stacks.iter().zip(&stack_ids) {
        let mut unit = TeardownUnit::new(
            stack.name.clone(),
            UnitKind::SupportingStack,
            stack.resource.clone(),
        );
        for dep in &stack.depends_on {
            let targets: Vec<&str> = ids_by_name
                .get(dep.as_str())
                .map(|ids| ids.iter().copied().filter(|id| *id != own_id.as_str()).collect())
                .unwrap_or_default();
            if targets.is_empty() {
                warn!(
                    stack = %own_id,
                    dependency = %dep,
                    "Ignoring dependency that names no other stack"
                );
            }
            for id in targets {
                if !unit.depends_on.iter().any(|d| d == id) {
                    unit.depends_on.push(id.to_string());
                }
            }
        }
        unit.depends_on.extend(record_id.clone());
        units.push(unit);
    }

    units.extend(record);
    units
}

fn order_units(cluster: &str, units: Vec<TeardownUnit>) -> Result<TeardownPlan> {
    let mut by_id: HashMap<String, TeardownUnit> = HashMap::new();
    for unit in units {
        let id = unit.id();
        if by_id.insert(id.clone(), unit).is_some() {
            return Err(Error::planning(cluster, format!("duplicate teardown unit {}", id)));
        }
    }

    // dependents[x] = units that must be removed before x
    let mut dependents: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (id, unit) in &by_id {
        for dep in &unit.depends_on {
            if by_id.contains_key(dep) {
                dependents.entry(dep.as_str()).or_default().insert(id.as_str());
            }
        }
    }

    let total = by_id.len();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order: Vec<String> = Vec::with_capacity(total);

    while placed.len() < total {
        let level: BTreeSet<(UnitKind, &str, &str)> = by_id
            .iter()
            .filter(|(id, _)| !placed.contains(id.as_str()))
            .filter(|(id, _)| {
                dependents
                    .get(id.as_str())
                    .map_or(true, |ds| ds.iter().all(|d| placed.contains(d)))
            })
            .map(|(id, unit)| (unit.kind, unit.name.as_str(), id.as_str()))
            .collect();

        if level.is_empty() {
            let mut stuck: Vec<&str> = by_id
                .keys()
                .map(String::as_str)
                .filter(|id| !placed.contains(id))
                .collect();
            stuck.sort_unstable();
            return Err(Error::planning(
                cluster,
                format!("dependency cycle among {}", stuck.join(", ")),
            ));
        }

        debug!(level = order.len(), units = level.len(), "Computed teardown level");
        for (_, _, id) in level {
            placed.insert(id);
            order.push(id.to_string());
        }
    }

    let ordered = order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect();
    Ok(TeardownPlan::from_ordered(ordered))
}
