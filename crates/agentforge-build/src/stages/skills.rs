use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::debug;

use agentforge_core::{IssueKind, SkillReference, ValidationIssue};

use super::{BuildContext, StageOutputs, ValidationStage};
use crate::skills::{fetch_skills, SkillBundle};
use crate::stage::Stage;

/// Checks skills against the lock, fetches them and verifies their
/// integrity and tool requirements.
pub struct SkillStage;

#[async_trait]
impl ValidationStage for SkillStage {
    fn stage(&self) -> Stage {
        Stage::Skills
    }

    async fn run(&self, ctx: &BuildContext<'_>, out: &mut StageOutputs) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        // Only pinned, version-matching references are fetched.
        let mut wanted: BTreeSet<(String, String)> = BTreeSet::new();
        for agent in ctx.graph.agents() {
            for (i, skill) in agent.skills.iter().enumerate() {
                let location = agent.source.item("skills", i);
                match ctx.lock.entry(&skill.name) {
                    None => issues.push(
                        ValidationIssue::error(
                            IssueKind::IntegrityError,
                            location,
                            format!("skill '{}' is not pinned in skills.lock", skill.name),
                        )
                        .with_suggestion(format!(
                            "add a [[skill]] entry for {} with its integrity",
                            skill.key()
                        )),
                    ),
                    Some(pin) if pin.version != skill.version => issues.push(
                        ValidationIssue::error(
                            IssueKind::IntegrityError,
                            location,
                            format!(
                                "agent '{}' wants {} but skills.lock pins version {}",
                                agent.name,
                                skill.key(),
                                pin.version
                            ),
                        )
                        .with_suggestion(format!("use version {} or update the lock", pin.version)),
                    ),
                    Some(_) => {
                        wanted.insert((skill.name.clone(), skill.version.clone()));
                    }
                }
            }
        }

        if wanted.is_empty() {
            return issues;
        }

        let fetched = fetch_skills(
            ctx.registry.clone(),
            wanted.into_iter().collect(),
            ctx.config.probe_concurrency,
            ctx.config.probe_timeout,
        )
        .await;
        debug!(skills = fetched.len(), "skill fetches settled");

        // Verify each fetched bundle once; remember the failure per key.
        let mut verified: BTreeMap<String, Result<(), SkillFailure>> = BTreeMap::new();
        for ((name, version), result) in fetched {
            let key = format!("{name}@{version}");
            let outcome = match result {
                Err(e) => Err(SkillFailure::Fetch(e.to_string())),
                Ok(bundle) => verify_bundle(ctx, bundle, out),
            };
            verified.insert(key, outcome);
        }

        for agent in ctx.graph.agents() {
            for (i, skill) in agent.skills.iter().enumerate() {
                let location = agent.source.item("skills", i);
                let key = skill.key();
                match verified.get(&key) {
                    // Not fetched: already reported above.
                    None => {}
                    Some(Err(failure)) => {
                        issues.push(skill_failure(skill, failure, location));
                    }
                    Some(Ok(())) => {
                        let Some(resolved) = out.skills.get(&key) else {
                            continue;
                        };
                        for needed in &resolved.tools {
                            let declared = agent
                                .tools
                                .iter()
                                .filter(|t| t.reference() == needed.tool)
                                .map(|t| t.access())
                                .max();
                            if declared.map_or(false, |a| a.satisfies(needed.access)) {
                                continue;
                            }
                            let have = declared
                                .map(|a| format!("declares it with {a} access"))
                                .unwrap_or_else(|| "does not declare it".to_string());
                            issues.push(
                                ValidationIssue::error(
                                    IssueKind::ReferenceError,
                                    location.clone(),
                                    format!(
                                        "skill {key} needs tool '{}' with {} access, but agent '{}' {have}",
                                        needed.tool, needed.access, agent.name
                                    ),
                                )
                                .with_suggestion(format!(
                                    "add '{}' with access {} to the agent's tools",
                                    needed.tool, needed.access
                                )),
                            );
                        }
                    }
                }
            }
        }

        issues
    }
}

enum SkillFailure {
    Fetch(String),
    Integrity(String),
}

/// Compare a fetched bundle with its lock pin; record it when it matches.
fn verify_bundle(
    ctx: &BuildContext<'_>,
    bundle: SkillBundle,
    out: &mut StageOutputs,
) -> Result<(), SkillFailure> {
    let pinned = ctx
        .lock
        .entry(&bundle.name)
        .map(|e| e.integrity.clone())
        .unwrap_or_default();
    let actual = bundle
        .integrity()
        .map_err(|e| SkillFailure::Integrity(format!("cannot hash bundle: {e}")))?;
    if actual != pinned {
        return Err(SkillFailure::Integrity(format!(
            "lock pins {pinned}, registry served {actual}"
        )));
    }
    let key = format!("{}@{}", bundle.name, bundle.version);
    out.skills.insert(key, bundle.into_resolved(actual));
    Ok(())
}

fn skill_failure(
    skill: &SkillReference,
    failure: &SkillFailure,
    location: agentforge_core::Location,
) -> ValidationIssue {
    match failure {
        SkillFailure::Fetch(reason) => ValidationIssue::error(
            IssueKind::ReferenceError,
            location,
            format!("skill {} could not be fetched: {reason}", skill.key()),
        ),
        SkillFailure::Integrity(reason) => ValidationIssue::error(
            IssueKind::IntegrityError,
            location,
            format!("skill {} failed its integrity check: {reason}", skill.key()),
        )
        .with_suggestion("re-pin the skill in skills.lock if the new content is trusted"),
    }
}
