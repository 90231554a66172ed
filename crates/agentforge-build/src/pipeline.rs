//! Build pipeline orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, Instrument};

use agentforge_core::domain::issue::tally;
use agentforge_core::obs;
use agentforge_core::{
    load_project, BuildManifest, FsManifestStore, ManifestStore, ReferenceGraph, StoredManifest,
    ValidationIssue,
};

use crate::config::BuildConfig;
use crate::error::Result;
use crate::manifest::ManifestBuilder;
use crate::probe::{EndpointProbe, HttpProbe};
use crate::skills::{DirectorySkillRegistry, SkillRegistry};
use crate::stage::StageResult;
use crate::stages::{default_stages, BuildContext, StageOutputs, ValidationStage};

/// Result of one build.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Loader issues first, then each stage's issues in stage order.
    pub issues: Vec<ValidationIssue>,
    pub stages: Vec<StageResult>,
    /// Present only when `success`.
    pub manifest: Option<BuildManifest>,
    pub success: bool,
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn error_count(&self) -> usize {
        tally(&self.issues).0
    }

    pub fn warning_count(&self) -> usize {
        tally(&self.issues).1
    }
}

/// The six-stage validation pipeline plus manifest construction.
pub struct BuildPipeline {
    config: BuildConfig,
    probe: Arc<dyn EndpointProbe>,
    registry: Option<Arc<dyn SkillRegistry>>,
    stages: Vec<Box<dyn ValidationStage>>,
}

impl BuildPipeline {
    /// Pipeline with the HTTP probe and the project-local skill registry.
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate()?;
        let probe = Arc::new(HttpProbe::new(config.probe_timeout)?);
        Ok(Self {
            config,
            probe,
            registry: None,
            stages: default_stages(),
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn EndpointProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Override the skill registry. Defaults to `<root>/.skills`.
    pub fn with_registry(mut self, registry: Arc<dyn SkillRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Load, validate and (on zero errors) build the manifest for `root`.
    ///
    /// Only an unusable project root or a failure to hash the manifest is
    /// an `Err`. Every spec problem lands in `PipelineResult::issues`.
    pub async fn run(&self, root: &Path) -> Result<PipelineResult> {
        let span = obs::build_span(&root.display().to_string());
        self.run_stages(root).instrument(span).await
    }

    async fn run_stages(&self, root: &Path) -> Result<PipelineResult> {
        let start = Instant::now();
        let loaded = load_project(root)?;
        obs::emit_build_started(
            &root.display().to_string(),
            loaded.snapshot.agents.len(),
            loaded.snapshot.loops.len(),
        );

        let graph = ReferenceGraph::build(&loaded.snapshot);
        let registry: Arc<dyn SkillRegistry> = match &self.registry {
            Some(registry) => Arc::clone(registry),
            None => Arc::new(DirectorySkillRegistry::for_project(root)),
        };
        let ctx = BuildContext {
            root,
            graph: &graph,
            lock: &loaded.snapshot.lock,
            config: &self.config,
            probe: Arc::clone(&self.probe),
            registry,
        };

        let mut issues = loaded.issues;
        let mut outputs = StageOutputs::default();
        let mut stages = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let stage_start = Instant::now();
            let found = stage.run(&ctx, &mut outputs).await;
            let (errors, warnings) = tally(&found);
            let duration_ms = stage_start.elapsed().as_millis() as u64;
            obs::emit_stage_finished(stage.stage().name(), errors, warnings, duration_ms);
            stages.push(StageResult {
                stage: stage.stage(),
                errors,
                warnings,
                duration_ms,
            });
            issues.extend(found);
        }

        let (errors, warnings) = tally(&issues);
        let success = errors == 0;
        let manifest = if success {
            Some(ManifestBuilder::build(&graph, &outputs)?)
        } else {
            None
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_build_finished(success, errors, warnings, duration_ms);

        Ok(PipelineResult {
            issues,
            stages,
            manifest,
            success,
            duration_ms,
        })
    }
}

/// Where manifests go for `root`: `out_dir` as-is when absolute, else under `root`.
pub fn manifest_dir(root: &Path, config: &BuildConfig) -> PathBuf {
    if config.out_dir.is_absolute() {
        config.out_dir.clone()
    } else {
        root.join(&config.out_dir)
    }
}

/// Persist a sealed manifest, keyed by its hash.
pub fn persist_manifest(
    store: &dyn ManifestStore,
    manifest: &BuildManifest,
) -> Result<StoredManifest> {
    let stored = store.put(manifest)?;
    obs::emit_manifest_written(&stored.hash, &stored.path.display().to_string(), stored.written);
    if !stored.written {
        info!(hash = %stored.hash, "manifest unchanged; existing artifact kept");
    }
    Ok(stored)
}

/// Persist into the filesystem store configured for `root`.
pub fn write_manifest(
    root: &Path,
    config: &BuildConfig,
    manifest: &BuildManifest,
) -> Result<StoredManifest> {
    let store = FsManifestStore::new(manifest_dir(root, config))?;
    persist_manifest(&store, manifest)
}
