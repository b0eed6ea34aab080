//! Teardown units and the ordered plan

use std::collections::HashMap;
use std::fmt;

use decom_common::ResourceRef;
use serde::Serialize;

/// What a teardown unit is
///
/// The declaration order doubles as the tie-break when several units become
/// removable at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum UnitKind {
    /// A node group; drained before removal
    NodeGroup,
    /// Control-plane, network or other infrastructure the cluster relies on
    SupportingStack,
    /// The cluster record itself
    ClusterRecord,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitKind::NodeGroup => "node group",
            UnitKind::SupportingStack => "stack",
            UnitKind::ClusterRecord => "cluster",
        };
        f.write_str(s)
    }
}

/// One resource targeted for removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownUnit {
    /// Unit name (the backing object's name)
    pub name: String,
    /// Unit kind
    pub kind: UnitKind,
    /// Object removed for this unit
    pub resource: ResourceRef,
    /// Ids of units that must be removed after this one
    pub depends_on: Vec<String>,
}

impl TeardownUnit {
    /// Create a unit with no dependencies
    pub fn new(name: impl Into<String>, kind: UnitKind, resource: ResourceRef) -> Self {
        Self {
            name: name.into(),
            kind,
            resource,
            depends_on: Vec::new(),
        }
    }

    /// Unique id within a plan ("Kind/name" of the backing object)
    pub fn id(&self) -> String {
        format!("{}/{}", self.resource.kind, self.resource.name)
    }
}

impl fmt::Display for TeardownUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id())
    }
}

/// Units in removal order
///
/// A unit never appears after a unit it depends on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownPlan {
    units: Vec<TeardownUnit>,
    #[serde(skip)]
    dependents: HashMap<String, Vec<String>>,
}

impl TeardownPlan {
    /// Build a plan from units that are already in removal order
    pub(crate) fn from_ordered(units: Vec<TeardownUnit>) -> Self {
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for unit in &units {
            for dep in &unit.depends_on {
                dependents.entry(dep.clone()).or_default().push(unit.id());
            }
        }
        Self { units, dependents }
    }

    /// Iterate units in removal order
    pub fn iter(&self) -> impl Iterator<Item = &TeardownUnit> {
        self.units.iter()
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True if there is nothing to remove
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Ids of the units that depend on `id` (and so are removed before it)
    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of a unit in removal order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.units.iter().position(|u| u.id() == id)
    }
}
