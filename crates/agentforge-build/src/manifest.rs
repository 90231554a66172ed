//! Manifest builder: fold a zero-error build into a sealed manifest.
//!
//! Every collection is put in a fixed order here, so the canonical form
//! (and therefore the hash) never depends on directory enumeration order.

use std::collections::BTreeSet;

use agentforge_core::{
    BuildManifest, ReferenceGraph, ResolvedAgent, ResolvedLoop, ResolvedSkillRef, ToolGrant,
    MANIFEST_FORMAT_VERSION,
};

use crate::stages::bundling::compose_instruction;
use crate::stages::StageOutputs;

pub struct ManifestBuilder;

impl ManifestBuilder {
    /// Build and seal the manifest for `graph` with the stage outputs.
    pub fn build(
        graph: &ReferenceGraph,
        out: &StageOutputs,
    ) -> agentforge_core::Result<BuildManifest> {
        let mut names = BTreeSet::new();
        let mut agents = Vec::new();
        for agent in graph.agents() {
            if !names.insert(agent.name.as_str()) {
                continue;
            }
            let skills = agent
                .skills
                .iter()
                .filter_map(|s| out.skills.get(&s.key()))
                .map(|r| ResolvedSkillRef {
                    name: r.name.clone(),
                    version: r.version.clone(),
                    integrity: r.integrity.clone(),
                })
                .collect();
            let instruction = out
                .instructions
                .get(&agent.name)
                .cloned()
                .unwrap_or_else(|| compose_instruction(agent, out));
            agents.push(ResolvedAgent {
                name: agent.name.clone(),
                model: agent.model.clone(),
                instruction,
                tools: agent.tools.clone(),
                skills,
                acl: agent.acl.clone(),
            });
        }

        let mut loop_names = BTreeSet::new();
        let loops = graph
            .loops()
            .iter()
            .filter(|l| loop_names.insert(l.name.as_str()))
            .map(|l| ResolvedLoop {
                name: l.name.clone(),
                schedule: l.schedule.clone(),
                agent: l.agent.clone(),
                run_as: l.run_as.clone(),
                instruction: l.instruction.clone(),
                acl: l.acl.clone(),
            })
            .collect();

        let service_accounts = graph.service_accounts().map(|sa| sa.name.clone()).collect();

        let mut tool_grants: Vec<ToolGrant> = graph
            .project()
            .map(|p| p.tool_grants.clone())
            .unwrap_or_default();
        tool_grants.sort_by(|a, b| a.tool.cmp(&b.tool));

        BuildManifest {
            format_version: MANIFEST_FORMAT_VERSION,
            project: graph.project().map(|p| p.name.clone()).unwrap_or_default(),
            agents,
            loops,
            service_accounts,
            tool_grants,
            bundles: out.bundles.values().cloned().collect(),
            skills: out.skills.values().cloned().collect(),
            hash: String::new(),
        }
        .seal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentforge_core::{load_project, ToolBundle};
    use std::fs;

    fn project(root: &std::path::Path, description: &str) {
        fs::create_dir_all(root.join("agents")).unwrap();
        fs::write(root.join("project.yaml"), "name: acme\n").unwrap();
        fs::write(
            root.join("agents/b.yaml"),
            "name: b\nmodel: o3\ndescription: second\n",
        )
        .unwrap();
        fs::write(
            root.join("agents/a.yaml"),
            format!("name: a\nmodel: o3\ndescription: {description}\n"),
        )
        .unwrap();
    }

    fn build(root: &std::path::Path) -> BuildManifest {
        let report = load_project(root).unwrap();
        let graph = ReferenceGraph::build(&report.snapshot);
        ManifestBuilder::build(&graph, &StageOutputs::default()).unwrap()
    }

    #[test]
    fn test_agents_sorted_and_hash_sealed() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path(), "first");
        let manifest = build(dir.path());
        let names: Vec<_> = manifest.agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        manifest.verify().unwrap();
    }

    #[test]
    fn test_description_change_changes_hash_and_revert_restores() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path(), "first");
        let original = build(dir.path()).hash;
        project(dir.path(), "changed");
        let changed = build(dir.path()).hash;
        project(dir.path(), "first");
        let reverted = build(dir.path()).hash;
        assert_ne!(original, changed);
        assert_eq!(original, reverted);
    }

    #[test]
    fn test_bundle_bytes_feed_the_hash() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path(), "first");
        let graph = ReferenceGraph::build(&load_project(dir.path()).unwrap().snapshot);

        let mut out = StageOutputs::default();
        out.bundles.insert(
            "tools/x.js".into(),
            ToolBundle {
                path: "tools/x.js".into(),
                sha256: "a".repeat(64),
                source: "exports.handler = 1".into(),
            },
        );
        let one = ManifestBuilder::build(&graph, &out).unwrap();
        out.bundles.get_mut("tools/x.js").unwrap().source.push(';');
        let two = ManifestBuilder::build(&graph, &out).unwrap();
        assert_ne!(one.hash, two.hash);
    }
}
