//! Translation of paths between the two mirrored roots
//!
//! A file is "the same file" in both trees when its path relative to each
//! root is identical. [`PathMapper`] computes that relative path under one
//! root and re-anchors it under the other. Mapping is purely lexical and
//! never touches the filesystem.

use std::path::{Path, PathBuf};

use super::errors::DomainError;
use super::newtypes::SyncRoot;

/// Maps `path` from under `from_root` to the corresponding path under `to_root`
///
/// # Errors
/// Returns `DomainError::PathOutsideRoot` if `path` is not `from_root` or
/// one of its descendants
pub fn map_path(
    path: &Path,
    from_root: &SyncRoot,
    to_root: &SyncRoot,
) -> Result<PathBuf, DomainError> {
    let relative = from_root.relative(path)?;
    to_root.join(&relative)
}

/// Bidirectional mapper bound to a fixed pair of roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    from: SyncRoot,
    to: SyncRoot,
}

impl PathMapper {
    /// Creates a mapper translating paths under `from` into paths under `to`
    #[must_use]
    pub fn new(from: SyncRoot, to: SyncRoot) -> Self {
        Self { from, to }
    }

    /// The root paths are translated from
    #[must_use]
    pub fn from_root(&self) -> &SyncRoot {
        &self.from
    }

    /// The root paths are translated into
    #[must_use]
    pub fn to_root(&self) -> &SyncRoot {
        &self.to
    }

    /// Maps a path under the source root to the target root
    pub fn map(&self, path: &Path) -> Result<PathBuf, DomainError> {
        map_path(path, &self.from, &self.to)
    }

    /// Maps a path under the target root back to the source root
    pub fn map_back(&self, path: &Path) -> Result<PathBuf, DomainError> {
        map_path(path, &self.to, &self.from)
    }

    /// Path relative to the source root
    pub fn relative(&self, path: &Path) -> Result<PathBuf, DomainError> {
        self.from.relative(path)
    }
}
