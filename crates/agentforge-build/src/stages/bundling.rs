use async_trait::async_trait;

use agentforge_core::domain::digest::sha256_hex;
use agentforge_core::{AgentSpec, IssueKind, ToolBundle, ToolEntry, ValidationIssue};

use super::tools::locate_local_tool;
use super::{BuildContext, StageOutputs, ValidationStage};
use crate::stage::Stage;

/// Packages local tools and composes each agent's final instruction.
pub struct BundlingStage;

/// Description followed by the prompt fragments of every resolved skill,
/// in skill declaration order, separated by blank lines.
pub fn compose_instruction(agent: &AgentSpec, out: &StageOutputs) -> String {
    let mut parts = vec![agent.description.trim_end().to_string()];
    for skill in &agent.skills {
        if let Some(resolved) = out.skills.get(&skill.key()) {
            parts.extend(
                resolved
                    .prompts
                    .iter()
                    .map(|p| p.trim_end().to_string())
                    .filter(|p| !p.is_empty()),
            );
        }
    }
    parts.join("\n\n")
}

#[async_trait]
impl ValidationStage for BundlingStage {
    fn stage(&self) -> Stage {
        Stage::Bundling
    }

    async fn run(&self, ctx: &BuildContext<'_>, out: &mut StageOutputs) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for agent in ctx.graph.agents() {
            for (i, tool) in agent.tools.iter().enumerate() {
                let name = match tool {
                    ToolEntry::Local { name, .. } => name,
                    ToolEntry::Remote { .. } | ToolEntry::Agent { .. } => continue,
                };
                if out.bundles.contains_key(name) {
                    continue;
                }
                // Missing or escaping files were reported by the tools stage.
                let Ok(path) = locate_local_tool(ctx.root, name) else {
                    continue;
                };
                let bytes = match std::fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        issues.push(ValidationIssue::error(
                            IssueKind::SchemaError,
                            agent.source.item("tools", i),
                            format!("cannot package local tool '{name}': {e}"),
                        ));
                        continue;
                    }
                };
                let sha256 = sha256_hex(&bytes);
                match String::from_utf8(bytes) {
                    Ok(source) => {
                        out.bundles.insert(
                            name.clone(),
                            ToolBundle {
                                path: name.clone(),
                                sha256,
                                source,
                            },
                        );
                    }
                    Err(_) => issues.push(ValidationIssue::error(
                        IssueKind::SchemaError,
                        agent.source.item("tools", i),
                        format!("local tool '{name}' is not valid UTF-8 and cannot be bundled"),
                    )),
                }
            }
        }

        for agent in ctx.graph.agents() {
            if out.instructions.contains_key(&agent.name) {
                continue;
            }
            let instruction = compose_instruction(agent, out);
            out.instructions.insert(agent.name.clone(), instruction);
        }

        issues
    }
}
