//! Source positions carried by loaded entities.

use std::path::PathBuf;

use crate::loader::source_map::SourceMap;

use super::issue::Location;

/// Where an entity was declared, with enough of the document layout to
/// point at individual keys and list items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecSource {
    /// Path relative to the project root.
    pub path: PathBuf,
    map: SourceMap,
}

impl SpecSource {
    pub fn new(path: impl Into<PathBuf>, map: SourceMap) -> Self {
        Self {
            path: path.into(),
            map,
        }
    }

    /// Location of the document itself.
    pub fn start(&self) -> Location {
        Location::new(&self.path, 1)
    }

    /// Location of a top-level key, falling back to the document start.
    pub fn key(&self, key: &str) -> Location {
        Location::new(&self.path, self.map.key_line(key).unwrap_or(1))
    }

    /// Location of the `index`-th item under a top-level list key, falling
    /// back to the key itself (flow-style lists) and then the document start.
    pub fn item(&self, key: &str, index: usize) -> Location {
        let line = self
            .map
            .item_line(key, index)
            .or_else(|| self.map.key_line(key))
            .unwrap_or(1);
        Location::new(&self.path, line)
    }
}
