//! Human-facing and machine-readable build reports.

use serde::Serialize;

use agentforge_core::{ValidationIssue, VERSION};

use crate::pipeline::PipelineResult;
use crate::stage::StageResult;

/// Serializable summary of a build, for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport<'a> {
    /// agentforge version that produced the report.
    pub version: &'static str,
    pub success: bool,
    pub errors: usize,
    pub warnings: usize,
    pub issues: &'a [ValidationIssue],
    pub stages: &'a [StageResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
}

impl<'a> BuildReport<'a> {
    pub fn new(result: &'a PipelineResult) -> Self {
        Self {
            version: VERSION,
            success: result.success,
            errors: result.error_count(),
            warnings: result.warning_count(),
            issues: &result.issues,
            stages: &result.stages,
            manifest_hash: result.manifest.as_ref().map(|m| m.hash.as_str()),
            manifest_path: None,
        }
    }

    pub fn with_manifest_path(mut self, path: impl Into<String>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Trailing summary line: `2 errors, 1 warning`.
pub fn render_summary(errors: usize, warnings: usize) -> String {
    format!("{}, {}", plural(errors, "error"), plural(warnings, "warning"))
}

/// One block per issue in pipeline order, then the summary.
pub fn render_text(report: &BuildReport<'_>) -> String {
    let mut out = String::new();
    for issue in report.issues {
        out.push_str(&issue.to_string());
        out.push('\n');
    }
    if !report.issues.is_empty() {
        out.push('\n');
    }
    if let Some(hash) = report.manifest_hash {
        match &report.manifest_path {
            Some(path) => out.push_str(&format!("manifest {hash} -> {path}\n")),
            None => out.push_str(&format!("manifest {hash}\n")),
        }
    }
    let verdict = if report.success { "build succeeded" } else { "build failed" };
    out.push_str(&format!(
        "{verdict}: {}\n",
        render_summary(report.errors, report.warnings)
    ));
    out
}
