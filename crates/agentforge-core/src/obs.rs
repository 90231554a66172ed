//! Structured lifecycle events for builds and dispatch.
//!
//! Every event is an `info!` (or `warn!`) record with an `event` field, so
//! JSON log consumers can filter on it.

use tracing::{info, warn};

/// Span tagging everything inside one build with its project root.
///
/// Attach with `Instrument::instrument`; builds await across stages.
pub fn build_span(root: &str) -> tracing::Span {
    tracing::info_span!("agentforge.build", root = %root)
}

pub fn emit_build_started(root: &str, agents: usize, loops: usize) {
    info!(event = "build.started", root = %root, agents = agents, loops = loops);
}

/// Emit event: one pipeline stage ran to completion.
pub fn emit_stage_finished(stage: &str, errors: usize, warnings: usize, duration_ms: u64) {
    info!(
        event = "build.stage_finished",
        stage = %stage,
        errors = errors,
        warnings = warnings,
        duration_ms = duration_ms,
    );
}

pub fn emit_build_finished(success: bool, errors: usize, warnings: usize, duration_ms: u64) {
    info!(
        event = "build.finished",
        success = success,
        errors = errors,
        warnings = warnings,
        duration_ms = duration_ms,
    );
}

pub fn emit_manifest_written(hash: &str, path: &str, written: bool) {
    info!(event = "manifest.written", hash = %hash, path = %path, deduplicated = !written);
}

/// Emit event: an authorization decision. Denials log at `warn`.
pub fn emit_authz_decided(principal: &str, resource: &str, allowed: bool, check: Option<&str>) {
    if allowed {
        info!(event = "authz.decided", principal = %principal, resource = %resource, allowed = true);
    } else {
        warn!(
            event = "authz.decided",
            principal = %principal,
            resource = %resource,
            allowed = false,
            check = check.unwrap_or("unknown"),
        );
    }
}

/// Emit event: a write call was recorded instead of executed.
pub fn emit_dispatch_simulated(agent: &str, tool: &str, principal: &str) {
    info!(event = "dispatch.simulated", agent = %agent, tool = %tool, principal = %principal);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_inside_build_span() {
        let _guard = build_span("/tmp/project").entered();
        emit_build_started("/tmp/project", 2, 1);
        emit_authz_decided("user:alice", "triage", false, Some("role"));
    }
}
