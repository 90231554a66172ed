use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use agentforge_core::domain::model::nearest_match;
use agentforge_core::{EdgeKind, IssueKind, Location, ToolEntry, ValidationIssue};

use super::{suggest_agent, BuildContext, StageOutputs, ValidationStage};
use crate::probe::{probe_endpoints, ProbeOutcome};
use crate::stage::Stage;

/// Resolves every tool entry: local artifacts, remote endpoints, agent targets.
pub struct ToolStage;

/// Why a local tool reference does not resolve to a usable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LocalToolProblem {
    Missing,
    OutsideRoot,
    Unreadable(String),
    NoHandler,
}

fn handler_export() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(export\s+(default\s+)?(async\s+)?(function\s*\*?\s*|const\s+|let\s+)handler\b|(module\.)?exports\.handler\s*=|module\.exports\s*=|(async\s+)?def\s+handler\s*\(|pub\s+(async\s+)?fn\s+handler\s*\()",
        )
        .expect("handler pattern compiles")
    })
}

/// Locate a local tool under `root` and make sure it stays inside it.
pub(crate) fn locate_local_tool(root: &Path, name: &str) -> Result<PathBuf, LocalToolProblem> {
    let path = root.join(name);
    if !path.is_file() {
        return Err(LocalToolProblem::Missing);
    }
    let canonical_root = root
        .canonicalize()
        .map_err(|e| LocalToolProblem::Unreadable(e.to_string()))?;
    let canonical = path
        .canonicalize()
        .map_err(|e| LocalToolProblem::Unreadable(e.to_string()))?;
    if !canonical.starts_with(&canonical_root) {
        return Err(LocalToolProblem::OutsideRoot);
    }
    Ok(canonical)
}

/// Full check: present, inside the root, UTF-8, exports a `handler`.
fn check_local_tool(root: &Path, name: &str) -> Result<(), LocalToolProblem> {
    let path = locate_local_tool(root, name)?;
    let text =
        std::fs::read_to_string(&path).map_err(|e| LocalToolProblem::Unreadable(e.to_string()))?;
    if handler_export().is_match(&text) {
        Ok(())
    } else {
        Err(LocalToolProblem::NoHandler)
    }
}

fn local_issue(name: &str, problem: &LocalToolProblem, location: Location) -> ValidationIssue {
    match problem {
        LocalToolProblem::Missing => ValidationIssue::error(
            IssueKind::ReferenceError,
            location,
            format!("local tool '{name}' does not exist"),
        ),
        LocalToolProblem::OutsideRoot => ValidationIssue::error(
            IssueKind::SchemaError,
            location,
            format!("local tool '{name}' resolves outside the project root"),
        ),
        LocalToolProblem::Unreadable(reason) => ValidationIssue::error(
            IssueKind::SchemaError,
            location,
            format!("local tool '{name}' cannot be read: {reason}"),
        ),
        LocalToolProblem::NoHandler => ValidationIssue::error(
            IssueKind::SchemaError,
            location,
            format!("local tool '{name}' does not export a `handler`"),
        )
        .with_suggestion("export a function named `handler` from the tool module"),
    }
}

fn unreachable_issue(
    url: &str,
    outcome: &ProbeOutcome,
    reachable: &[&str],
    location: Location,
) -> ValidationIssue {
    let message = match outcome {
        ProbeOutcome::TimedOut(after) => format!(
            "remote tool '{url}' did not answer within {}ms",
            after.as_millis()
        ),
        ProbeOutcome::Unreachable(reason) => format!("remote tool '{url}' is unreachable: {reason}"),
        ProbeOutcome::Reachable => format!("remote tool '{url}' is unreachable"),
    };
    let issue = ValidationIssue::error(IssueKind::ReachabilityError, location, message);
    match nearest_match(url, reachable.iter().copied(), 4) {
        Some(near) => issue.with_suggestion(format!("did you mean '{near}'?")),
        None => issue,
    }
}

#[async_trait]
impl ValidationStage for ToolStage {
    fn stage(&self) -> Stage {
        Stage::Tools
    }

    async fn run(&self, ctx: &BuildContext<'_>, _out: &mut StageOutputs) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut local_checks: BTreeMap<&str, Result<(), LocalToolProblem>> = BTreeMap::new();
        // url -> every entry declaring it, in graph order
        let mut remote: BTreeMap<String, Vec<Location>> = BTreeMap::new();

        for agent in ctx.graph.agents() {
            for (i, tool) in agent.tools.iter().enumerate() {
                let location = agent.source.item("tools", i);
                match tool {
                    ToolEntry::Local { name, .. } => {
                        let result = local_checks
                            .entry(name.as_str())
                            .or_insert_with(|| check_local_tool(ctx.root, name));
                        if let Err(problem) = result {
                            issues.push(local_issue(name, problem, location));
                        }
                    }
                    ToolEntry::Remote { server, .. } => {
                        remote.entry(server.clone()).or_default().push(location);
                    }
                    // Resolved from the graph's dangling edges below.
                    ToolEntry::Agent { .. } => {}
                }
            }
        }

        if ctx.config.offline {
            for (url, locations) in &remote {
                if let Some(first) = locations.first() {
                    issues.push(ValidationIssue::warning(
                        IssueKind::ReachabilityError,
                        first.clone(),
                        format!("reachability of '{url}' not checked (offline build)"),
                    ));
                }
            }
        } else if !remote.is_empty() {
            let outcomes = probe_endpoints(
                ctx.probe.clone(),
                remote.keys().cloned().collect(),
                ctx.config.probe_concurrency,
                ctx.config.probe_timeout,
            )
            .await;
            let reachable: Vec<&str> = outcomes
                .iter()
                .filter(|(_, o)| o.is_reachable())
                .map(|(url, _)| url.as_str())
                .collect();
            debug!(
                endpoints = outcomes.len(),
                reachable = reachable.len(),
                "remote probes settled"
            );
            for (url, locations) in &remote {
                let outcome = outcomes
                    .get(url)
                    .cloned()
                    .unwrap_or_else(|| ProbeOutcome::Unreachable("probe did not run".to_string()));
                if outcome.is_reachable() {
                    continue;
                }
                for location in locations {
                    issues.push(unreachable_issue(url, &outcome, &reachable, location.clone()));
                }
            }
        }

        for dangling in ctx.graph.dangling(EdgeKind::TargetsAgent) {
            let issue = ValidationIssue::error(
                IssueKind::ReferenceError,
                dangling.location.clone(),
                format!(
                    "agent '{}' calls unknown agent '{}'",
                    dangling.from, dangling.target
                ),
            );
            issues.push(match suggest_agent(ctx.graph, &dangling.target) {
                Some(s) => issue.with_suggestion(s),
                None => issue,
            });
        }

        issues
    }
}
