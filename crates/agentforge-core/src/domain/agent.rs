//! Agent specifications.

use serde::{Deserialize, Serialize};

use super::access::Role;
use super::source::SpecSource;
use super::tool::ToolEntry;

/// A registry-qualified skill pinned to a version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillReference {
    pub name: String,
    pub version: String,
}

impl SkillReference {
    /// `name@version`.
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Who may invoke or view an agent or loop.
///
/// `principal` stays a raw string; its format is checked by the ACL
/// validation stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AclEntry {
    pub principal: String,
    pub role: Role,
}

/// A validated agent document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub name: String,
    pub model: String,
    pub description: String,
    /// Exhaustive allowlist, in declared order.
    pub tools: Vec<ToolEntry>,
    pub skills: Vec<SkillReference>,
    pub acl: Vec<AclEntry>,
    pub source: SpecSource,
}

impl AgentSpec {
    /// Targets of every `agent:` tool entry, in declared order, with the
    /// entry's index in `tools`.
    pub fn agent_tool_targets(&self) -> impl Iterator<Item = (usize, &str)> {
        self.tools.iter().enumerate().filter_map(|(i, t)| match t {
            ToolEntry::Agent { agent, .. } => Some((i, agent.as_str())),
            ToolEntry::Remote { .. } | ToolEntry::Local { .. } => None,
        })
    }
}
