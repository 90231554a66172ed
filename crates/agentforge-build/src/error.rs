use thiserror::Error;

/// Failures that stop a build from running at all.
///
/// Problems with the specs themselves are `ValidationIssue`s, not errors.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] agentforge_core::CoreError),

    #[error(transparent)]
    Store(#[from] agentforge_core::ManifestStoreError),
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Why a skill could not be fetched from its registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkillFetchError {
    #[error("skill {name}@{version} not found in registry")]
    NotFound { name: String, version: String },

    #[error("skill {name}@{version} is malformed: {reason}")]
    Malformed {
        name: String,
        version: String,
        reason: String,
    },

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}
