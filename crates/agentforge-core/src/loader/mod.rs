//! Spec loader: discovers, parses and schema-checks every spec document of a
//! project tree.
//!
//! The loader never stops at the first bad file. Each document yields either
//! a typed entity or a non-empty list of issues, and the project-level
//! result carries everything collected.
//!
//! Parsing is two-phase: the text is first read as an untyped YAML value
//! (failure is a `ParseError`), then deserialized into the typed document
//! (failure is a `SchemaError`).

pub mod documents;
pub mod source_map;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::agent::AgentSpec;
use crate::domain::error::{CoreError, Result};
use crate::domain::issue::{IssueKind, Location, ValidationIssue};
use crate::domain::project::{LoopSpec, ProjectConfig, SkillLock};
use crate::domain::source::SpecSource;

use documents::{is_spec_file, AgentDocument, LockDocument, LoopDocument, ProjectDocument};
use source_map::SourceMap;

pub use documents::is_valid_schedule;

/// Project configuration document, relative to the project root.
pub const PROJECT_FILE: &str = "project.yaml";
/// Skill lock document, relative to the project root.
pub const LOCK_FILE: &str = "skills.lock";
/// Directory holding one agent document per file.
pub const AGENTS_DIR: &str = "agents";
/// Directory holding one loop document per file.
pub const LOOPS_DIR: &str = "loops";

/// Every entity that loaded cleanly from one project tree.
#[derive(Debug, Clone, Default)]
pub struct ProjectSnapshot {
    pub root: PathBuf,
    pub project: Option<ProjectConfig>,
    pub agents: Vec<AgentSpec>,
    pub loops: Vec<LoopSpec>,
    pub lock: SkillLock,
}

/// Loaded entities plus every issue found while loading.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub snapshot: ProjectSnapshot,
    pub issues: Vec<ValidationIssue>,
}

/// Load the whole project at `root`.
///
/// Only an unusable root is an `Err`; every per-file problem is an issue.
pub fn load_project(root: &Path) -> Result<LoadReport> {
    if !root.is_dir() {
        return Err(CoreError::ProjectRoot(root.to_path_buf()));
    }

    let mut report = LoadReport {
        snapshot: ProjectSnapshot {
            root: root.to_path_buf(),
            ..ProjectSnapshot::default()
        },
        issues: Vec::new(),
    };

    let project_path = root.join(PROJECT_FILE);
    if project_path.is_file() {
        report.snapshot.project = absorb(
            &mut report.issues,
            load_project_config(root, Path::new(PROJECT_FILE)),
        );
    } else {
        report.issues.push(ValidationIssue::error(
            IssueKind::SchemaError,
            Location::file_start(PROJECT_FILE),
            format!("missing project configuration `{PROJECT_FILE}`"),
        ));
    }

    for rel in discover(root, AGENTS_DIR)? {
        if let Some(agent) = absorb(&mut report.issues, load_agent(root, &rel)) {
            report.snapshot.agents.push(agent);
        }
    }

    for rel in discover(root, LOOPS_DIR)? {
        if let Some(spec) = absorb(&mut report.issues, load_loop(root, &rel)) {
            report.snapshot.loops.push(spec);
        }
    }

    if root.join(LOCK_FILE).is_file() {
        if let Some(lock) = absorb(&mut report.issues, load_lock(root, Path::new(LOCK_FILE))) {
            report.snapshot.lock = lock;
        }
    }

    debug!(
        agents = report.snapshot.agents.len(),
        loops = report.snapshot.loops.len(),
        issues = report.issues.len(),
        "project loaded"
    );
    Ok(report)
}

fn absorb<T>(
    issues: &mut Vec<ValidationIssue>,
    result: std::result::Result<T, Vec<ValidationIssue>>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(found) => {
            issues.extend(found);
            None
        }
    }
}

/// Spec files under `root/dir`, as root-relative paths sorted by name.
///
/// A missing directory is an empty set.
fn discover(root: &Path, dir: &str) -> Result<Vec<PathBuf>> {
    let full = root.join(dir);
    if !full.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(&full)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_spec_file(&path) {
            files.push(Path::new(dir).join(entry.file_name()));
        }
    }
    files.sort();
    Ok(files)
}

fn read_document(root: &Path, rel: &Path) -> std::result::Result<String, Vec<ValidationIssue>> {
    fs::read_to_string(root.join(rel)).map_err(|e| {
        vec![ValidationIssue::error(
            IssueKind::ParseError,
            Location::file_start(rel),
            format!("cannot read document: {e}"),
        )]
    })
}

fn yaml_line(err: &serde_yaml::Error) -> usize {
    err.location().map(|l| l.line()).unwrap_or(1)
}

/// Parse `text` into `T`, distinguishing malformed YAML from schema violations.
fn parse_yaml<T: DeserializeOwned>(
    rel: &Path,
    text: &str,
) -> std::result::Result<T, Vec<ValidationIssue>> {
    if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(text) {
        return Err(vec![ValidationIssue::error(
            IssueKind::ParseError,
            Location::new(rel, yaml_line(&e)),
            format!("malformed YAML: {e}"),
        )]);
    }
    serde_yaml::from_str::<T>(text).map_err(|e| {
        vec![ValidationIssue::error(
            IssueKind::SchemaError,
            Location::new(rel, yaml_line(&e)),
            format!("schema violation: {e}"),
        )]
    })
}

/// Load one agent document.
pub fn load_agent(root: &Path, rel: &Path) -> std::result::Result<AgentSpec, Vec<ValidationIssue>> {
    let text = read_document(root, rel)?;
    let doc: AgentDocument = parse_yaml(rel, &text)?;
    doc.into_spec(SpecSource::new(rel, SourceMap::from_yaml(&text)))
}

/// Load one loop document.
pub fn load_loop(root: &Path, rel: &Path) -> std::result::Result<LoopSpec, Vec<ValidationIssue>> {
    let text = read_document(root, rel)?;
    let doc: LoopDocument = parse_yaml(rel, &text)?;
    doc.into_spec(SpecSource::new(rel, SourceMap::from_yaml(&text)))
}

/// Load the project configuration document.
pub fn load_project_config(
    root: &Path,
    rel: &Path,
) -> std::result::Result<ProjectConfig, Vec<ValidationIssue>> {
    let text = read_document(root, rel)?;
    let doc: ProjectDocument = parse_yaml(rel, &text)?;
    doc.into_config(SpecSource::new(rel, SourceMap::from_yaml(&text)))
}

/// Load the TOML skill lock.
pub fn load_lock(root: &Path, rel: &Path) -> std::result::Result<SkillLock, Vec<ValidationIssue>> {
    let text = read_document(root, rel)?;
    if let Err(e) = text.parse::<toml::Table>() {
        return Err(vec![ValidationIssue::error(
            IssueKind::ParseError,
            Location::new(rel, toml_line(&text, &e)),
            format!("malformed TOML: {}", e.message()),
        )]);
    }
    let doc: LockDocument = toml::from_str(&text).map_err(|e| {
        vec![ValidationIssue::error(
            IssueKind::SchemaError,
            Location::new(rel, toml_line(&text, &e)),
            format!("schema violation: {}", e.message()),
        )]
    })?;
    doc.into_lock(SpecSource::new(rel, SourceMap::from_toml(&text)))
}

fn toml_line(text: &str, err: &toml::de::Error) -> usize {
    err.span()
        .map(|span| text[..span.start.min(text.len())].lines().count().max(1))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_parse_error_vs_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "agents/bad.yaml", "name: [unclosed\n");
        write(dir.path(), "agents/wrong.yaml", "name: wrong\nmodel: gpt-4o\n");

        let bad = load_agent(dir.path(), Path::new("agents/bad.yaml")).unwrap_err();
        assert_eq!(bad[0].kind, IssueKind::ParseError);

        let wrong = load_agent(dir.path(), Path::new("agents/wrong.yaml")).unwrap_err();
        assert_eq!(wrong[0].kind, IssueKind::SchemaError);
        assert!(wrong[0].message.contains("description"));
    }

    #[test]
    fn test_bad_access_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "agents/a.yaml",
            "name: a\nmodel: gpt-4o\ndescription: x\ntools:\n  - server: https://x.dev\n    access: admin\n",
        );
        let issues = load_agent(dir.path(), Path::new("agents/a.yaml")).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::SchemaError);
        assert!(issues[0].message.contains("admin"));
    }

    #[test]
    fn test_missing_access_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "agents/a.yaml",
            "name: a\nmodel: gpt-4o\ndescription: x\ntools:\n  - server: https://x.dev\n",
        );
        let issues = load_agent(dir.path(), Path::new("agents/a.yaml")).unwrap_err();
        assert!(issues[0].message.contains("access"));
    }

    #[test]
    fn test_tool_entry_error_points_at_item_line() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "agents/a.yaml",
            "name: a\nmodel: gpt-4o\ndescription: x\ntools:\n  - server: https://x.dev\n    access: read\n  - server: ftp://x.dev\n    access: read\n",
        );
        let issues = load_agent(dir.path(), Path::new("agents/a.yaml")).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location.line, 7);
    }

    #[test]
    fn test_lock_parse() {
        let dir = tempfile::tempdir().unwrap();
        let integrity = format!("sha256-{}", "a".repeat(64));
        write(
            dir.path(),
            "skills.lock",
            &format!("[[skill]]\nname = \"acme/gh\"\nversion = \"1.0.0\"\nintegrity = \"{integrity}\"\n"),
        );
        let lock = load_lock(dir.path(), Path::new(LOCK_FILE)).unwrap();
        assert_eq!(lock.entry("acme/gh").unwrap().version, "1.0.0");
        assert_eq!(lock.location_of("acme/gh").line, 1);
    }

    #[test]
    fn test_lock_malformed_integrity() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "skills.lock",
            "[[skill]]\nname = \"acme/gh\"\nversion = \"1.0.0\"\nintegrity = \"md5-abc\"\n",
        );
        let issues = load_lock(dir.path(), Path::new(LOCK_FILE)).unwrap_err();
        assert_eq!(issues[0].kind, IssueKind::SchemaError);
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_project(&dir.path().join("nope")).is_err());
    }
}
