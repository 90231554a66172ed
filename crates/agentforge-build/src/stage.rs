//! Pipeline stage identities and per-stage results.

use serde::{Deserialize, Serialize};

/// The validation stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Model set membership.
    Models,
    /// Local artifacts, remote reachability, agent-tool targets.
    Tools,
    /// Lock pins, fetch, integrity, skill tools within the allowlist.
    Skills,
    /// Duplicate names, loop targets, agent-call cycles.
    References,
    /// Principal formats, declared service accounts, orphan grants.
    Acl,
    /// Local tool packaging and instruction composition.
    Bundling,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Models,
        Stage::Tools,
        Stage::Skills,
        Stage::References,
        Stage::Acl,
        Stage::Bundling,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Models => "models",
            Stage::Tools => "tools",
            Stage::Skills => "skills",
            Stage::References => "references",
            Stage::Acl => "acl",
            Stage::Bundling => "bundling",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one stage run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    pub errors: usize,
    pub warnings: usize,
    pub duration_ms: u64,
}

impl StageResult {
    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_cheap_first() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::ALL[0].name(), "models");
        assert_eq!(Stage::ALL[5].name(), "bundling");
    }

    #[test]
    fn test_stage_serde_name_matches() {
        for stage in Stage::ALL {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, stage.name());
        }
    }
}
