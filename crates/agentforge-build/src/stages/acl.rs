use std::collections::BTreeSet;

use async_trait::async_trait;

use agentforge_core::domain::model::nearest_match;
use agentforge_core::{
    AclEntry, EdgeKind, IssueKind, Location, Principal, ReferenceGraph, SpecSource,
    ValidationIssue,
};

use super::{BuildContext, StageOutputs, ValidationStage};
use crate::stage::Stage;

/// Principal formats and project-scope consistency.
pub struct AclStage;

fn suggest_service_account(graph: &ReferenceGraph, name: &str) -> Option<String> {
    let names = graph.service_accounts().map(|sa| sa.name.as_str());
    nearest_match(name, names, 5).map(|n| format!("did you mean '{n}'?"))
}

/// Parse `raw`, reporting format and undeclared service accounts.
fn check_principal(
    graph: &ReferenceGraph,
    raw: &str,
    location: &Location,
    issues: &mut Vec<ValidationIssue>,
) {
    match Principal::parse(raw) {
        Err(e) => issues.push(
            ValidationIssue::error(IssueKind::AclFormatError, location.clone(), e.to_string())
                .with_suggestion(
                    "principals are user:<id>, group:<name> or service-account:<name>",
                ),
        ),
        Ok(Principal::ServiceAccount(name)) if !graph.has_service_account(&name) => {
            let issue = ValidationIssue::error(
                IssueKind::AclConsistencyError,
                location.clone(),
                format!("service account '{name}' is not declared in project.yaml"),
            );
            issues.push(match suggest_service_account(graph, &name) {
                Some(s) => issue.with_suggestion(s),
                None => issue,
            });
        }
        Ok(_) => {}
    }
}

fn check_acl(
    graph: &ReferenceGraph,
    what: &str,
    name: &str,
    acl: &[AclEntry],
    source: &SpecSource,
    issues: &mut Vec<ValidationIssue>,
) {
    if acl.is_empty() {
        issues.push(
            ValidationIssue::warning(
                IssueKind::AclConsistencyError,
                source.start(),
                format!("{what} '{name}' has no acl; every invocation will be denied"),
            )
            .with_suggestion("add an acl entry granting execute to the intended callers"),
        );
    }
    for (i, entry) in acl.iter().enumerate() {
        check_principal(graph, &entry.principal, &source.item("acl", i), issues);
    }
}

#[async_trait]
impl ValidationStage for AclStage {
    fn stage(&self) -> Stage {
        Stage::Acl
    }

    async fn run(&self, ctx: &BuildContext<'_>, _out: &mut StageOutputs) -> Vec<ValidationIssue> {
        let graph = ctx.graph;
        let mut issues = Vec::new();

        for agent in graph.agents() {
            check_acl(graph, "agent", &agent.name, &agent.acl, &agent.source, &mut issues);
        }
        for spec in graph.loops() {
            check_acl(graph, "loop", &spec.name, &spec.acl, &spec.source, &mut issues);
        }

        for dangling in graph.dangling(EdgeKind::RunsAs) {
            let issue = ValidationIssue::error(
                IssueKind::AclConsistencyError,
                dangling.location.clone(),
                format!(
                    "loop '{}' runs as undeclared service account '{}'",
                    dangling.from, dangling.target
                ),
            );
            issues.push(match suggest_service_account(graph, &dangling.target) {
                Some(s) => issue.with_suggestion(s),
                None => issue,
            });
        }

        if let Some(project) = graph.project() {
            let mut seen_tools = BTreeSet::new();
            for (i, grant) in project.tool_grants.iter().enumerate() {
                let location = project.source.item("tool_grants", i);
                for entry in &grant.grants {
                    check_principal(graph, &entry.principal, &location, &mut issues);
                }
                if !seen_tools.insert(grant.tool.as_str()) {
                    issues.push(ValidationIssue::warning(
                        IssueKind::AclConsistencyError,
                        location.clone(),
                        format!("tool '{}' has more than one grant block", grant.tool),
                    ));
                }
                if !graph.is_declared_tool(&grant.tool) {
                    let issue = ValidationIssue::warning(
                        IssueKind::AclConsistencyError,
                        location,
                        format!("grant for tool '{}' which no agent declares", grant.tool),
                    );
                    let declared = graph.declared_tool_references();
                    issues.push(match nearest_match(&grant.tool, declared, 4) {
                        Some(near) => issue.with_suggestion(format!("did you mean '{near}'?")),
                        None => issue,
                    });
                }
            }
        }

        issues
    }
}
