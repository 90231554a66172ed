pub mod fs;

use thiserror::Error;

use crate::domain::error::CoreError;
use crate::domain::manifest::BuildManifest;

/// Errors from manifest store operations.
#[derive(Debug, Error)]
pub enum ManifestStoreError {
    #[error("manifest not found: {0}")]
    NotFound(String),

    #[error("invalid manifest hash: {0}")]
    InvalidHash(String),

    #[error("manifest is not sealed")]
    Unsealed,

    #[error("stored manifest {hash} is corrupt: {source}")]
    Corrupt {
        hash: String,
        #[source]
        source: CoreError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, ManifestStoreError>;

/// Outcome of storing a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredManifest {
    pub hash: String,
    pub path: std::path::PathBuf,
    /// `false` when a manifest with this hash was already present.
    pub written: bool,
}

/// Content-addressed manifest store. The hash is both the key and the
/// rollback handle.
pub trait ManifestStore: Send + Sync {
    /// Store a sealed manifest. Deduplicates by hash.
    fn put(&self, manifest: &BuildManifest) -> Result<StoredManifest>;

    /// Load and re-verify the manifest stored under `hash`.
    fn get(&self, hash: &str) -> Result<BuildManifest>;

    fn exists(&self, hash: &str) -> Result<bool>;

    /// Every stored hash, sorted.
    fn list(&self) -> Result<Vec<String>>;
}
