//! Project-scope entities: loops, service accounts, tool grants, skill lock.

use serde::{Deserialize, Serialize};

use super::access::Access;
use super::agent::AclEntry;
use super::issue::Location;
use super::source::SpecSource;

/// A scheduled, unattended invocation of an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSpec {
    pub name: String,
    pub schedule: String,
    pub agent: String,
    pub run_as: String,
    pub instruction: String,
    pub acl: Vec<AclEntry>,
    pub source: SpecSource,
}

/// Identity that loops run as. Declared once at project scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub name: String,
    pub location: Location,
}

/// One principal's access to a granted tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantEntry {
    pub principal: String,
    pub access: Access,
}

/// Privileges on a single tool reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolGrant {
    pub tool: String,
    pub grants: Vec<GrantEntry>,
}

/// A declared credential type. Only the identifier is known here; secrets
/// are injected by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The project-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub name: String,
    pub service_accounts: Vec<ServiceAccount>,
    pub tool_grants: Vec<ToolGrant>,
    pub credentials: Vec<CredentialDecl>,
    pub source: SpecSource,
}

/// A pinned skill in the lock document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockEntry {
    pub name: String,
    pub version: String,
    pub integrity: String,
}

/// The skill lock: pinned versions plus integrity records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillLock {
    pub entries: Vec<LockEntry>,
    pub source: SpecSource,
}

impl SkillLock {
    pub fn entry(&self, name: &str) -> Option<&LockEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn location_of(&self, name: &str) -> Location {
        match self.entries.iter().position(|e| e.name == name) {
            Some(i) => self.source.item("skill", i),
            None => self.source.start(),
        }
    }
}
