//! Build configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

pub const ENV_PROBE_TIMEOUT_MS: &str = "AGENTFORGE_PROBE_TIMEOUT_MS";
pub const ENV_PROBE_CONCURRENCY: &str = "AGENTFORGE_PROBE_CONCURRENCY";
pub const ENV_OFFLINE: &str = "AGENTFORGE_OFFLINE";
pub const ENV_OUT_DIR: &str = "AGENTFORGE_OUT_DIR";

/// Knobs for one build invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Per-probe bound for remote reachability checks and skill fetches.
    pub probe_timeout: Duration,
    /// Maximum probes or fetches in flight at once.
    pub probe_concurrency: usize,
    /// Skip remote probes, recording a warning per endpoint.
    pub offline: bool,
    /// Where manifests are written, relative to the project root unless absolute.
    pub out_dir: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(5000),
            probe_concurrency: 8,
            offline: false,
            out_dir: PathBuf::from(".agentforge/manifests"),
        }
    }
}

impl BuildConfig {
    /// Defaults overridden by `AGENTFORGE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_PROBE_TIMEOUT_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| BuildError::Config(format!("{ENV_PROBE_TIMEOUT_MS}={raw}")))?;
            config.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_PROBE_CONCURRENCY) {
            config.probe_concurrency = raw
                .trim()
                .parse()
                .map_err(|_| BuildError::Config(format!("{ENV_PROBE_CONCURRENCY}={raw}")))?;
        }
        if let Some(raw) = lookup(ENV_OFFLINE) {
            config.offline = matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(raw) = lookup(ENV_OUT_DIR) {
            config.out_dir = PathBuf::from(raw);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe_concurrency == 0 {
            return Err(BuildError::Config(
                "probe concurrency must be at least 1".to_string(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(BuildError::Config("probe timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}
