//! Raw document shapes as written on disk, and their conversion into
//! validated entities.

use std::path::Path;

use serde::Deserialize;

use crate::domain::agent::{AclEntry, AgentSpec, SkillReference};
use crate::domain::issue::{IssueKind, ValidationIssue};
use crate::domain::principal::is_valid_name;
use crate::domain::project::{
    CredentialDecl, LockEntry, LoopSpec, ProjectConfig, ServiceAccount, SkillLock, ToolGrant,
};
use crate::domain::source::SpecSource;
use crate::domain::tool::ToolEntry;
use crate::domain::Access;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ToolDocument {
    server: Option<String>,
    name: Option<String>,
    access: Access,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AgentDocument {
    name: String,
    model: String,
    description: String,
    #[serde(default)]
    tools: Vec<ToolDocument>,
    #[serde(default)]
    skills: Vec<SkillReference>,
    #[serde(default)]
    acl: Vec<AclEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LoopDocument {
    name: String,
    schedule: String,
    agent: String,
    run_as: String,
    instruction: String,
    #[serde(default)]
    acl: Vec<AclEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceAccountDocument {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProjectDocument {
    name: String,
    #[serde(default)]
    service_accounts: Vec<ServiceAccountDocument>,
    #[serde(default)]
    tool_grants: Vec<ToolGrant>,
    #[serde(default)]
    credentials: Vec<CredentialDecl>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LockDocument {
    #[serde(default)]
    skill: Vec<LockEntry>,
}

/// Collects schema findings for one document.
struct Findings<'a> {
    source: &'a SpecSource,
    issues: Vec<ValidationIssue>,
}

impl<'a> Findings<'a> {
    fn new(source: &'a SpecSource) -> Self {
        Self {
            source,
            issues: Vec::new(),
        }
    }

    fn at_key(&mut self, key: &str, message: String) {
        self.issues.push(ValidationIssue::error(
            IssueKind::SchemaError,
            self.source.key(key),
            message,
        ));
    }

    fn at_item(&mut self, key: &str, index: usize, message: String) {
        self.issues.push(ValidationIssue::error(
            IssueKind::SchemaError,
            self.source.item(key, index),
            message,
        ));
    }

    fn check_name(&mut self, what: &str, name: &str) {
        if !is_valid_name(name) {
            self.at_key(
                "name",
                format!("{what} name '{name}' must be lowercase letters, digits and hyphens"),
            );
        }
    }

    fn check_non_empty(&mut self, key: &str, value: &str) {
        if value.trim().is_empty() {
            self.at_key(key, format!("`{key}` must not be empty"));
        }
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<ValidationIssue>> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(self.issues)
        }
    }
}

impl AgentDocument {
    pub(crate) fn into_spec(self, source: SpecSource) -> Result<AgentSpec, Vec<ValidationIssue>> {
        let mut findings = Findings::new(&source);
        findings.check_name("agent", &self.name);
        findings.check_non_empty("model", &self.model);
        findings.check_non_empty("description", &self.description);

        let mut tools = Vec::with_capacity(self.tools.len());
        for (i, doc) in self.tools.iter().enumerate() {
            match ToolEntry::from_fields(doc.server.as_deref(), doc.name.as_deref(), doc.access) {
                Ok(entry) => tools.push(entry),
                Err(message) => findings.at_item("tools", i, message),
            }
        }

        for (i, skill) in self.skills.iter().enumerate() {
            if !skill.name.contains('/') {
                findings.at_item(
                    "skills",
                    i,
                    format!(
                        "skill '{}' must be registry-qualified (<registry>/<name>)",
                        skill.name
                    ),
                );
            }
            if skill.version.trim().is_empty() {
                findings.at_item("skills", i, format!("skill '{}' has an empty version", skill.name));
            }
        }

        let spec = AgentSpec {
            name: self.name,
            model: self.model,
            description: self.description,
            tools,
            skills: self.skills,
            acl: self.acl,
            source: source.clone(),
        };
        findings.finish(spec)
    }
}

/// Normalise 5-field cron to the 6-field (seconds-first) form.
fn normalize_schedule(schedule: &str) -> String {
    let trimmed = schedule.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Whether `schedule` is a valid 5- or 6-field cron expression.
pub fn is_valid_schedule(schedule: &str) -> bool {
    let fields = schedule.split_whitespace().count();
    (5..=6).contains(&fields) && normalize_schedule(schedule).parse::<croner::Cron>().is_ok()
}

impl LoopDocument {
    pub(crate) fn into_spec(self, source: SpecSource) -> Result<LoopSpec, Vec<ValidationIssue>> {
        let mut findings = Findings::new(&source);
        findings.check_name("loop", &self.name);
        findings.check_non_empty("instruction", &self.instruction);
        findings.check_non_empty("agent", &self.agent);
        findings.check_non_empty("run_as", &self.run_as);
        if !is_valid_schedule(&self.schedule) {
            findings.at_key(
                "schedule",
                format!("schedule '{}' is not a valid cron expression", self.schedule),
            );
        }

        let spec = LoopSpec {
            name: self.name,
            schedule: self.schedule.trim().to_string(),
            agent: self.agent,
            run_as: self.run_as,
            instruction: self.instruction,
            acl: self.acl,
            source: source.clone(),
        };
        findings.finish(spec)
    }
}

impl ProjectDocument {
    pub(crate) fn into_config(
        self,
        source: SpecSource,
    ) -> Result<ProjectConfig, Vec<ValidationIssue>> {
        let mut findings = Findings::new(&source);
        findings.check_non_empty("name", &self.name);

        let mut service_accounts = Vec::with_capacity(self.service_accounts.len());
        for (i, sa) in self.service_accounts.into_iter().enumerate() {
            if !is_valid_name(&sa.name) {
                findings.at_item(
                    "service_accounts",
                    i,
                    format!(
                        "service account name '{}' must be lowercase letters, digits and hyphens",
                        sa.name
                    ),
                );
            }
            service_accounts.push(ServiceAccount {
                name: sa.name,
                location: source.item("service_accounts", i),
            });
        }

        for (i, grant) in self.tool_grants.iter().enumerate() {
            if grant.tool.trim().is_empty() {
                findings.at_item("tool_grants", i, "tool grant has an empty `tool`".to_string());
            }
        }

        let config = ProjectConfig {
            name: self.name,
            service_accounts,
            tool_grants: self.tool_grants,
            credentials: self.credentials,
            source: source.clone(),
        };
        findings.finish(config)
    }
}

impl LockDocument {
    pub(crate) fn into_lock(self, source: SpecSource) -> Result<SkillLock, Vec<ValidationIssue>> {
        let mut findings = Findings::new(&source);
        for (i, entry) in self.skill.iter().enumerate() {
            let hex = entry
                .integrity
                .strip_prefix(crate::domain::digest::INTEGRITY_PREFIX)
                .unwrap_or_default();
            if !crate::domain::digest::is_sha256_hex(hex) {
                findings.at_item(
                    "skill",
                    i,
                    format!(
                        "lock entry '{}' has malformed integrity '{}' (expected sha256-<64 hex>)",
                        entry.name, entry.integrity
                    ),
                );
            }
        }
        findings.finish(SkillLock {
            entries: self.skill,
            source: source.clone(),
        })
    }
}

/// Whether `path` looks like a spec document.
pub(crate) fn is_spec_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
