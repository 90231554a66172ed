//! Validation issues: the unit of build feedback.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Position of a finding inside the project tree.
///
/// `file` is relative to the project root so reports and manifests never
/// depend on where the project is checked out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: line.max(1),
        }
    }

    /// Location pointing at the first line of `file`.
    pub fn file_start(file: impl AsRef<Path>) -> Self {
        Self::new(file.as_ref(), 1)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Error taxonomy for build findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// Malformed document.
    ParseError,
    /// Type/shape/enum violation, including unknown models.
    SchemaError,
    /// External endpoint unreachable within the probe timeout.
    ReachabilityError,
    /// Skill content hash does not match the lock.
    IntegrityError,
    /// Dangling name reference.
    ReferenceError,
    /// Agent-call graph cycle.
    CycleError,
    /// Malformed principal string.
    AclFormatError,
    /// Undeclared service account or orphaned grant.
    AclConsistencyError,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::ParseError => "ParseError",
            IssueKind::SchemaError => "SchemaError",
            IssueKind::ReachabilityError => "ReachabilityError",
            IssueKind::IntegrityError => "IntegrityError",
            IssueKind::ReferenceError => "ReferenceError",
            IssueKind::CycleError => "CycleError",
            IssueKind::AclFormatError => "AclFormatError",
            IssueKind::AclConsistencyError => "AclConsistencyError",
        };
        f.write_str(s)
    }
}

/// A single build finding, localized to a file and line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub location: Location,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn error(kind: IssueKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            location,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn warning(kind: IssueKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            location,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}[{}]: {}",
            self.location, self.severity, self.kind, self.message
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  help: {suggestion}")?;
        }
        Ok(())
    }
}

/// Count `(errors, warnings)` in a list of issues.
pub fn tally(issues: &[ValidationIssue]) -> (usize, usize) {
    let errors = issues.iter().filter(|i| i.is_error()).count();
    (errors, issues.len() - errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location_kind_and_help() {
        let issue = ValidationIssue::error(
            IssueKind::SchemaError,
            Location::new("agents/triage.yaml", 3),
            "unknown model 'gpt-5'",
        )
        .with_suggestion("did you mean 'gpt-4o'?");
        let text = issue.to_string();
        assert!(text.starts_with("agents/triage.yaml:3: error[SchemaError]"));
        assert!(text.contains("help: did you mean 'gpt-4o'?"));
    }

    #[test]
    fn test_tally_counts_by_severity() {
        let loc = Location::file_start("project.yaml");
        let issues = vec![
            ValidationIssue::error(IssueKind::ReferenceError, loc.clone(), "a"),
            ValidationIssue::warning(IssueKind::AclConsistencyError, loc.clone(), "b"),
            ValidationIssue::warning(IssueKind::AclConsistencyError, loc, "c"),
        ];
        assert_eq!(tally(&issues), (1, 2));
    }

    #[test]
    fn test_location_line_is_one_based() {
        assert_eq!(Location::new("a.yaml", 0).line, 1);
    }
}
