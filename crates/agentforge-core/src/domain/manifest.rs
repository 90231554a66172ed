//! The build manifest: the resolved, content-addressed product of a build.
//!
//! The manifest holds no timestamps, absolute paths or host data. Its
//! `hash` is a pure function of every other field, computed over their
//! canonical JSON form.

use serde::{Deserialize, Serialize};

use super::access::Access;
use super::agent::AclEntry;
use super::digest;
use super::error::{CoreError, Result};
use super::project::ToolGrant;
use super::tool::ToolEntry;

/// Bumped whenever the manifest layout changes incompatibly.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// A skill as resolved for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSkillRef {
    pub name: String,
    pub version: String,
    pub integrity: String,
}

/// An agent with skills merged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAgent {
    pub name: String,
    pub model: String,
    /// Description followed by skill prompt fragments in skill order.
    pub instruction: String,
    /// The allowlist, exactly as declared.
    pub tools: Vec<ToolEntry>,
    pub skills: Vec<ResolvedSkillRef>,
    pub acl: Vec<AclEntry>,
}

impl ResolvedAgent {
    /// Highest access this agent declares for `reference`, if any.
    pub fn declared_access(&self, reference: &str) -> Option<Access> {
        self.tools
            .iter()
            .filter(|t| t.reference() == reference)
            .map(ToolEntry::access)
            .max()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLoop {
    pub name: String,
    pub schedule: String,
    pub agent: String,
    pub run_as: String,
    pub instruction: String,
    pub acl: Vec<AclEntry>,
}

/// Packaged source of a local tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBundle {
    /// Path as referenced from agent specs.
    pub path: String,
    pub sha256: String,
    pub source: String,
}

/// A tool a skill needs, by reference and access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillTool {
    pub tool: String,
    pub access: Access,
}

/// Metadata of a fetched, integrity-checked skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSkill {
    pub name: String,
    pub version: String,
    pub integrity: String,
    pub tools: Vec<SkillTool>,
    pub prompts: Vec<String>,
}

/// The resolved project snapshot consumed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub format_version: u32,
    pub project: String,
    pub agents: Vec<ResolvedAgent>,
    pub loops: Vec<ResolvedLoop>,
    pub service_accounts: Vec<String>,
    pub tool_grants: Vec<ToolGrant>,
    pub bundles: Vec<ToolBundle>,
    pub skills: Vec<ResolvedSkill>,
    /// SHA-256 hex over the canonical form of every other field.
    #[serde(default)]
    pub hash: String,
}

impl BuildManifest {
    /// Compute the content hash, ignoring the current `hash` field.
    pub fn compute_hash(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("hash");
        }
        digest::compute_digest(&value)
    }

    /// Fill in `hash`. Call after all content is final.
    pub fn seal(mut self) -> Result<Self> {
        self.hash = self.compute_hash()?;
        Ok(self)
    }

    /// Check that `hash` matches the content.
    pub fn verify(&self) -> Result<()> {
        let actual = self.compute_hash()?;
        if actual != self.hash {
            return Err(CoreError::DigestMismatch {
                expected: self.hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Canonical bytes, as written to disk.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = serde_json::to_value(self)?;
        Ok(digest::canonical_json(&value)?.into_bytes())
    }

    pub fn agent(&self, name: &str) -> Option<&ResolvedAgent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn loop_spec(&self, name: &str) -> Option<&ResolvedLoop> {
        self.loops.iter().find(|l| l.name == name)
    }

    pub fn grants_for(&self, tool: &str) -> Option<&ToolGrant> {
        self.tool_grants.iter().find(|g| g.tool == tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::Role;

    fn sample() -> BuildManifest {
        BuildManifest {
            format_version: MANIFEST_FORMAT_VERSION,
            project: "acme".into(),
            agents: vec![ResolvedAgent {
                name: "triage".into(),
                model: "gpt-4o".into(),
                instruction: "Triage issues.".into(),
                tools: vec![ToolEntry::Remote {
                    server: "https://mcp.example.com/gh".into(),
                    access: Access::Read,
                }],
                skills: vec![],
                acl: vec![AclEntry {
                    principal: "group:eng".into(),
                    role: Role::Execute,
                }],
            }],
            loops: vec![],
            service_accounts: vec![],
            tool_grants: vec![],
            bundles: vec![],
            skills: vec![],
            hash: String::new(),
        }
    }

    #[test]
    fn test_seal_then_verify() {
        let manifest = sample().seal().expect("seal");
        assert!(digest::is_sha256_hex(&manifest.hash));
        manifest.verify().expect("verify");
    }

    #[test]
    fn test_hash_ignores_existing_hash_field() {
        let a = sample().seal().expect("seal a");
        let mut b = sample();
        b.hash = "garbage".into();
        assert_eq!(a.hash, b.compute_hash().expect("hash b"));
    }

    #[test]
    fn test_tampered_manifest_fails_verify() {
        let mut manifest = sample().seal().expect("seal");
        manifest.agents[0].instruction.push_str(" Also delete everything.");
        assert!(matches!(
            manifest.verify(),
            Err(CoreError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn test_canonical_bytes_stable() {
        let manifest = sample().seal().expect("seal");
        assert_eq!(
            manifest.to_canonical_bytes().expect("a"),
            manifest.to_canonical_bytes().expect("b")
        );
    }

    #[test]
    fn test_declared_access_takes_max() {
        let mut agent = sample().agents.remove(0);
        agent.tools.push(ToolEntry::Remote {
            server: "https://mcp.example.com/gh".into(),
            access: Access::Write,
        });
        assert_eq!(
            agent.declared_access("https://mcp.example.com/gh"),
            Some(Access::Write)
        );
        assert_eq!(agent.declared_access("https://other.example.com"), None);
    }
}
