//! Domain models for agentforge.
//!
//! Canonical definitions for the entities a build works with:
//! - `AgentSpec`, `LoopSpec`, `ProjectConfig`: loaded spec documents
//! - `ToolEntry`, `Principal`, `Access`, `Role`: the authorization vocabulary
//! - `ValidationIssue`: build findings
//! - `BuildManifest`: the content-addressed build product

pub mod access;
pub mod agent;
pub mod digest;
pub mod error;
pub mod issue;
pub mod manifest;
pub mod model;
pub mod principal;
pub mod project;
pub mod source;
pub mod tool;

pub use access::{Access, Role};
pub use agent::{AclEntry, AgentSpec, SkillReference};
pub use error::{CoreError, ParseError, Result};
pub use issue::{IssueKind, Location, Severity, ValidationIssue};
pub use manifest::{
    BuildManifest, ResolvedAgent, ResolvedLoop, ResolvedSkill, ResolvedSkillRef, SkillTool,
    ToolBundle, MANIFEST_FORMAT_VERSION,
};
pub use principal::Principal;
pub use project::{
    CredentialDecl, GrantEntry, LockEntry, LoopSpec, ProjectConfig, ServiceAccount, SkillLock,
    ToolGrant,
};
pub use source::SpecSource;
pub use tool::ToolEntry;
