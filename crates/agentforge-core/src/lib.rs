//! agentforge core library
//!
//! Entity model, spec loader, reference graph, canonical digests and the
//! content-addressed manifest store shared by the build pipeline, the
//! authorization model and the CLI.

pub mod domain;
pub mod graph;
pub mod loader;
pub mod obs;
pub mod store;
pub mod telemetry;

pub use domain::{
    AclEntry, Access, AgentSpec, BuildManifest, CoreError, CredentialDecl, GrantEntry, IssueKind,
    Location, LockEntry, LoopSpec, ParseError, Principal, ProjectConfig, ResolvedAgent,
    ResolvedLoop, ResolvedSkill, ResolvedSkillRef, Result, Role, ServiceAccount, Severity,
    SkillLock, SkillReference, SkillTool, SpecSource, ToolBundle, ToolEntry, ToolGrant,
    ValidationIssue, MANIFEST_FORMAT_VERSION,
};

pub use graph::{Cycle, DanglingEdge, Duplicate, Edge, EdgeKind, EntityKind, NodeRef, ReferenceGraph};

pub use loader::{load_project, LoadReport, ProjectSnapshot};

pub use store::fs::FsManifestStore;
pub use store::{ManifestStore, ManifestStoreError, StoredManifest};

/// Workspace version, recorded in every `BuildReport`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
