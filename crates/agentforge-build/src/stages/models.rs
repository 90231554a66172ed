use async_trait::async_trait;

use agentforge_core::domain::model::{is_supported_model, suggest_model, supported_models_list};
use agentforge_core::{IssueKind, ValidationIssue};

use super::{BuildContext, StageOutputs, ValidationStage};
use crate::stage::Stage;

/// Rejects models outside the supported set.
pub struct ModelStage;

#[async_trait]
impl ValidationStage for ModelStage {
    fn stage(&self) -> Stage {
        Stage::Models
    }

    async fn run(&self, ctx: &BuildContext<'_>, _out: &mut StageOutputs) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for agent in ctx.graph.agents() {
            if is_supported_model(&agent.model) {
                continue;
            }
            let supported = supported_models_list();
            let suggestion = match suggest_model(&agent.model) {
                Some(near) => format!("did you mean '{near}'? supported models: {supported}"),
                None => format!("supported models: {supported}"),
            };
            issues.push(
                ValidationIssue::error(
                    IssueKind::SchemaError,
                    agent.source.key("model"),
                    format!(
                        "agent '{}' uses unknown model '{}' (supported: {supported})",
                        agent.name, agent.model
                    ),
                )
                .with_suggestion(suggestion),
            );
        }
        issues
    }
}
