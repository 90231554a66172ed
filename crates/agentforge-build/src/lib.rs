//! agentforge build
//!
//! Runs the six validation stages over a loaded project and, when no stage
//! reports an error, folds the result into a sealed, content-addressed
//! manifest.

pub mod config;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod skills;
pub mod stage;
pub mod stages;

pub use config::BuildConfig;
pub use error::{BuildError, Result, SkillFetchError};
pub use manifest::ManifestBuilder;
pub use pipeline::{manifest_dir, persist_manifest, write_manifest, BuildPipeline, PipelineResult};
pub use probe::{EndpointProbe, HttpProbe, ProbeOutcome};
pub use report::{render_summary, render_text, BuildReport};
pub use skills::{DirectorySkillRegistry, SkillBundle, SkillRegistry};
pub use stage::{Stage, StageResult};
pub use stages::{BuildContext, StageOutputs, ValidationStage};
