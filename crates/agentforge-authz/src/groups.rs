//! Group membership, supplied by an external identity provider.

use std::collections::{BTreeMap, BTreeSet};

use agentforge_core::Principal;

/// Resolves which groups a principal belongs to.
pub trait GroupDirectory: Send + Sync {
    fn groups_of(&self, principal: &Principal) -> BTreeSet<String>;
}

/// Directory where nobody belongs to any group.
pub struct NoGroups;

impl GroupDirectory for NoGroups {
    fn groups_of(&self, _principal: &Principal) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Fixed membership table.
#[derive(Debug, Clone, Default)]
pub struct StaticGroupDirectory {
    members: BTreeMap<Principal, BTreeSet<String>>,
}

impl StaticGroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, principal: Principal, group: impl Into<String>) -> Self {
        self.add(principal, group);
        self
    }

    pub fn add(&mut self, principal: Principal, group: impl Into<String>) {
        self.members.entry(principal).or_default().insert(group.into());
    }
}

impl GroupDirectory for StaticGroupDirectory {
    fn groups_of(&self, principal: &Principal) -> BTreeSet<String> {
        self.members.get(principal).cloned().unwrap_or_default()
    }
}
