//! The six validation stages.
//!
//! Every stage reads the shared [`BuildContext`], may record derived data
//! in [`StageOutputs`] for later stages, and returns the issues it found.
//! A stage never fails: missing or invalid input from an earlier stage is
//! skipped or reported, never assumed away.

pub mod acl;
pub mod bundling;
pub mod models;
pub mod references;
pub mod skills;
pub mod tools;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use agentforge_core::domain::model::nearest_match;
use agentforge_core::{ReferenceGraph, ResolvedSkill, SkillLock, ToolBundle, ValidationIssue};

use crate::config::BuildConfig;
use crate::probe::EndpointProbe;
use crate::skills::SkillRegistry;
use crate::stage::Stage;

/// Read-only inputs shared by every stage of one build.
pub struct BuildContext<'a> {
    pub root: &'a Path,
    pub graph: &'a ReferenceGraph,
    pub lock: &'a SkillLock,
    pub config: &'a BuildConfig,
    pub probe: Arc<dyn EndpointProbe>,
    pub registry: Arc<dyn SkillRegistry>,
}

/// Data produced by one stage for a later one.
#[derive(Debug, Clone, Default)]
pub struct StageOutputs {
    /// Verified skills keyed by `name@version`.
    pub skills: BTreeMap<String, ResolvedSkill>,
    /// Packaged local tools keyed by path.
    pub bundles: BTreeMap<String, ToolBundle>,
    /// Composed instruction per agent name.
    pub instructions: BTreeMap<String, String>,
}

#[async_trait]
pub trait ValidationStage: Send + Sync {
    fn stage(&self) -> Stage;

    async fn run(&self, ctx: &BuildContext<'_>, out: &mut StageOutputs) -> Vec<ValidationIssue>;
}

/// The standard stage sequence.
pub fn default_stages() -> Vec<Box<dyn ValidationStage>> {
    vec![
        Box::new(models::ModelStage),
        Box::new(tools::ToolStage),
        Box::new(skills::SkillStage),
        Box::new(references::ReferenceStage),
        Box::new(acl::AclStage),
        Box::new(bundling::BundlingStage),
    ]
}

/// `did you mean 'x'?` for the nearest agent name, if any is close.
pub(crate) fn suggest_agent(graph: &ReferenceGraph, name: &str) -> Option<String> {
    let names = graph.agents().iter().map(|a| a.name.as_str());
    nearest_match(name, names, 5).map(|n| format!("did you mean '{n}'?"))
}
