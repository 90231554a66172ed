//! Skill registry access and bundle integrity.
//!
//! The registry is an external collaborator. The build only fetches
//! bundles through [`SkillRegistry`], checks them against the lock and
//! folds their metadata into the manifest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use agentforge_core::domain::digest;
use agentforge_core::{ResolvedSkill, SkillTool};

use crate::error::SkillFetchError;

/// A fetched skill: extra tool requirements plus prompt fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillBundle {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub tools: Vec<SkillTool>,
    #[serde(default)]
    pub prompts: Vec<String>,
}

impl SkillBundle {
    /// `sha256-<hex>` over the canonical JSON of the bundle.
    pub fn integrity(&self) -> agentforge_core::Result<String> {
        digest::integrity_of(&serde_json::to_value(self)?)
    }

    pub fn into_resolved(self, integrity: String) -> ResolvedSkill {
        ResolvedSkill {
            name: self.name,
            version: self.version,
            integrity,
            tools: self.tools,
            prompts: self.prompts,
        }
    }
}

#[async_trait]
pub trait SkillRegistry: Send + Sync {
    async fn fetch(&self, name: &str, version: &str) -> Result<SkillBundle, SkillFetchError>;
}

/// Registry backed by `<root>/<name>/<version>.json`.
pub struct DirectorySkillRegistry {
    root: PathBuf,
}

/// Conventional registry location inside a project.
pub const PROJECT_SKILLS_DIR: &str = ".skills";

impl DirectorySkillRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The registry a project carries at `<project>/.skills`.
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(PROJECT_SKILLS_DIR))
    }
}

#[async_trait]
impl SkillRegistry for DirectorySkillRegistry {
    async fn fetch(&self, name: &str, version: &str) -> Result<SkillBundle, SkillFetchError> {
        let not_found = || SkillFetchError::NotFound {
            name: name.to_string(),
            version: version.to_string(),
        };
        if name.split('/').any(|part| part.is_empty() || part == ".." || part == ".")
            || version.contains('/')
            || version.contains("..")
        {
            return Err(not_found());
        }

        let path = self.root.join(name).join(format!("{version}.json"));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(SkillFetchError::Unavailable(e.to_string())),
        };
        let bundle: SkillBundle =
            serde_json::from_slice(&bytes).map_err(|e| SkillFetchError::Malformed {
                name: name.to_string(),
                version: version.to_string(),
                reason: e.to_string(),
            })?;
        if bundle.name != name || bundle.version != version {
            return Err(SkillFetchError::Malformed {
                name: name.to_string(),
                version: version.to_string(),
                reason: format!("bundle declares {}@{}", bundle.name, bundle.version),
            });
        }
        Ok(bundle)
    }
}

/// Fetch every `(name, version)` pair, bounded like the endpoint probes.
pub async fn fetch_skills(
    registry: Arc<dyn SkillRegistry>,
    wanted: Vec<(String, String)>,
    concurrency: usize,
    timeout: Duration,
) -> BTreeMap<(String, String), Result<SkillBundle, SkillFetchError>> {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(wanted.len());

    for (name, version) in wanted {
        let registry = Arc::clone(&registry);
        let sem = Arc::clone(&sem);
        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            let result = match tokio::time::timeout(timeout, registry.fetch(&name, &version)).await
            {
                Ok(result) => result,
                Err(_) => Err(SkillFetchError::Unavailable(format!(
                    "fetch timed out after {}ms",
                    timeout.as_millis()
                ))),
            };
            ((name, version), result)
        }));
    }

    let mut results = BTreeMap::new();
    for joined in futures::future::join_all(tasks).await {
        match joined {
            Ok((key, result)) => {
                results.insert(key, result);
            }
            Err(e) => tracing::debug!(error = %e, "skill fetch task aborted"),
        }
    }
    results
}
