use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{ManifestStore, ManifestStoreError, Result, StoredManifest};
use crate::domain::digest::is_sha256_hex;
use crate::domain::manifest::BuildManifest;

/// Filesystem-backed manifest store.
///
/// Layout: `<root>/<hash>.json`, canonical JSON bytes.
pub struct FsManifestStore {
    root: PathBuf,
}

impl FsManifestStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a manifest with `hash` is (or would be) stored at.
    pub fn manifest_path(&self, hash: &str) -> Result<PathBuf> {
        if !is_sha256_hex(hash) {
            return Err(ManifestStoreError::InvalidHash(hash.to_string()));
        }
        Ok(self.root.join(format!("{hash}.json")))
    }
}

impl ManifestStore for FsManifestStore {
    fn put(&self, manifest: &BuildManifest) -> Result<StoredManifest> {
        if manifest.hash.is_empty() {
            return Err(ManifestStoreError::Unsealed);
        }
        manifest.verify()?;
        let path = self.manifest_path(&manifest.hash)?;

        if path.exists() {
            return Ok(StoredManifest {
                hash: manifest.hash.clone(),
                path,
                written: false,
            });
        }

        let bytes = manifest.to_canonical_bytes()?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        Ok(StoredManifest {
            hash: manifest.hash.clone(),
            path,
            written: true,
        })
    }

    fn get(&self, hash: &str) -> Result<BuildManifest> {
        let path = self.manifest_path(hash)?;
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestStoreError::NotFound(hash.to_string())
            } else {
                ManifestStoreError::Io(e)
            }
        })?;
        let corrupt = |source| ManifestStoreError::Corrupt {
            hash: hash.to_string(),
            source,
        };
        let manifest: BuildManifest = serde_json::from_slice(&bytes)
            .map_err(|e| corrupt(crate::domain::error::CoreError::Serialization(e)))?;
        manifest.verify().map_err(corrupt)?;
        if manifest.hash != hash {
            return Err(corrupt(crate::domain::error::CoreError::DigestMismatch {
                expected: hash.to_string(),
                actual: manifest.hash,
            }));
        }
        Ok(manifest)
    }

    fn exists(&self, hash: &str) -> Result<bool> {
        Ok(self.manifest_path(hash)?.exists())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_sha256_hex(stem) {
                    hashes.push(stem.to_string());
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }
}
