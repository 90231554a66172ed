use async_trait::async_trait;

use agentforge_core::{EdgeKind, IssueKind, ValidationIssue};

use super::{suggest_agent, BuildContext, StageOutputs, ValidationStage};
use crate::stage::Stage;

/// Name uniqueness, loop targets and agent-call cycles.
pub struct ReferenceStage;

#[async_trait]
impl ValidationStage for ReferenceStage {
    fn stage(&self) -> Stage {
        Stage::References
    }

    async fn run(&self, ctx: &BuildContext<'_>, _out: &mut StageOutputs) -> Vec<ValidationIssue> {
        let graph = ctx.graph;
        let mut issues = Vec::new();

        for dup in graph.duplicates() {
            issues.push(ValidationIssue::error(
                IssueKind::SchemaError,
                dup.duplicate.clone(),
                format!(
                    "duplicate {} name '{}' (first declared at {})",
                    dup.kind.as_str(),
                    dup.name,
                    dup.first
                ),
            ));
        }

        for dangling in graph.dangling(EdgeKind::InvokesAgent) {
            let issue = ValidationIssue::error(
                IssueKind::ReferenceError,
                dangling.location.clone(),
                format!(
                    "loop '{}' references unknown agent '{}'",
                    dangling.from, dangling.target
                ),
            );
            issues.push(match suggest_agent(graph, &dangling.target) {
                Some(s) => issue.with_suggestion(s),
                None => issue,
            });
        }

        for cycle in graph.find_cycles() {
            issues.push(
                ValidationIssue::error(
                    IssueKind::CycleError,
                    cycle.location.clone(),
                    format!("agent call cycle: {}", cycle.display_path()),
                )
                .with_suggestion("remove one of the agent: tool entries along the cycle"),
            );
        }

        issues
    }
}
