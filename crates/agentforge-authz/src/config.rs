//! Dispatch configuration: live-write overrides and call-depth cap.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use agentforge_core::Access;

use crate::error::{DispatchError, DispatchResult};

pub const ENV_LIVE_WRITES: &str = "AGENTFORGE_LIVE_WRITES";
pub const ENV_MAX_CALL_DEPTH: &str = "AGENTFORGE_MAX_CALL_DEPTH";

pub const DEFAULT_MAX_CALL_DEPTH: usize = 16;

/// Whether a call actually runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Live,
    /// Arguments recorded, synthetic success returned, nothing executed.
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Execute every write tool for real.
    pub live_writes: bool,
    /// Tool references whose writes execute for real.
    pub live_write_tools: BTreeSet<String>,
    /// Maximum agents on one call chain, the entry agent included.
    pub max_call_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            live_writes: false,
            live_write_tools: BTreeSet::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl DispatchConfig {
    /// Defaults overridden by environment.
    ///
    /// `AGENTFORGE_LIVE_WRITES` is either a boolean (global override) or a
    /// comma-separated list of tool references.
    pub fn from_env() -> DispatchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DispatchResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_LIVE_WRITES) {
            match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => config.live_writes = true,
                "" | "0" | "false" | "no" => {}
                _ => {
                    config.live_write_tools = raw
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect();
                }
            }
        }
        if let Some(raw) = lookup(ENV_MAX_CALL_DEPTH) {
            config.max_call_depth = raw
                .trim()
                .parse()
                .map_err(|_| DispatchError::Config(format!("{ENV_MAX_CALL_DEPTH}={raw}")))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_live_writes(mut self, live: bool) -> Self {
        self.live_writes = live;
        self
    }

    pub fn with_live_write_tool(mut self, tool: impl Into<String>) -> Self {
        self.live_write_tools.insert(tool.into());
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn validate(&self) -> DispatchResult<()> {
        if self.max_call_depth == 0 {
            return Err(DispatchError::Config(
                "max call depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Reads always run. Writes run only under a global or per-tool override.
    pub fn mode_for(&self, tool: &str, classified: Access) -> ExecutionMode {
        match classified {
            Access::Read => ExecutionMode::Live,
            Access::Write if self.live_writes || self.live_write_tools.contains(tool) => {
                ExecutionMode::Live
            }
            Access::Write => ExecutionMode::Simulated,
        }
    }
}
