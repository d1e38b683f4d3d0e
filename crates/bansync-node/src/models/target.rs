//! Synced targets (guilds).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A guild identifier (snowflake).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetRef(pub u64);

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TargetRef {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        super::parse_snowflake(s, "server id").map(Self)
    }
}

/// A resolved, currently reachable guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetRef,
    pub name: String,
}

impl Target {
    pub fn new(id: TargetRef, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Insertion-ordered set of synced guilds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TargetRef>", into = "Vec<TargetRef>")]
pub struct TargetSet {
    targets: Vec<TargetRef>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn contains(&self, target: TargetRef) -> bool {
        self.targets.contains(&target)
    }

    /// Append a target. Returns false if it was already present.
    pub fn insert(&mut self, target: TargetRef) -> bool {
        if self.contains(target) {
            return false;
        }
        self.targets.push(target);
        true
    }

    /// Returns false if the target was not present.
    pub fn remove(&mut self, target: TargetRef) -> bool {
        let before = self.targets.len();
        self.targets.retain(|t| *t != target);
        self.targets.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = TargetRef> + '_ {
        self.targets.iter().copied()
    }

    /// Keep only the targets in `live`, preserving order. Returns what was dropped.
    pub fn retain_live(&mut self, live: &HashSet<TargetRef>) -> Vec<TargetRef> {
        let (kept, pruned): (Vec<_>, Vec<_>) =
            self.targets.iter().copied().partition(|t| live.contains(t));
        self.targets = kept;
        pruned
    }
}

impl From<Vec<TargetRef>> for TargetSet {
    fn from(refs: Vec<TargetRef>) -> Self {
        let mut set = TargetSet::new();
        for target in refs {
            set.insert(target);
        }
        set
    }
}

impl From<TargetSet> for Vec<TargetRef> {
    fn from(set: TargetSet) -> Self {
        set.targets
    }
}
