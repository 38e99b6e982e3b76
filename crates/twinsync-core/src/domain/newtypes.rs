//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the two mirrored roots.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Root side
// ============================================================================

/// Which of the two configured trees a root designates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootSide {
    /// The watched tree (A)
    Left,
    /// The mirror tree (B)
    Right,
}

impl RootSide {
    /// Returns the other side
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            RootSide::Left => RootSide::Right,
            RootSide::Right => RootSide::Left,
        }
    }
}

impl Display for RootSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            RootSide::Left => "left",
            RootSide::Right => "right",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Path types
// ============================================================================

/// A validated absolute directory path designating one mirrored tree
///
/// SyncRoot ensures the path is:
/// - Absolute (starts with /)
/// - Normalized (no . or .. components)
///
/// Roots are configured once at startup and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct SyncRoot(PathBuf);

impl SyncRoot {
    /// Create a new SyncRoot, validating it is absolute
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute or
    /// escapes the filesystem root via `..`
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Root must be absolute: {}",
                path.display()
            )));
        }

        // Lexical normalization only; the directory may not exist yet
        let normalized = normalize_path(&path)?;
        Ok(Self(normalized))
    }

    /// Resolve a configured path (absolute or relative to the current
    /// directory) to the canonical location of an existing directory
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path cannot be resolved or
    /// is not a directory
    pub fn resolve(path: &Path) -> Result<Self, DomainError> {
        let canonical = std::fs::canonicalize(path).map_err(|e| {
            DomainError::InvalidPath(format!("cannot resolve {}: {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(DomainError::InvalidPath(format!(
                "not a directory: {}",
                canonical.display()
            )));
        }

        Self::new(canonical)
    }

    /// Get the inner path reference
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to owned PathBuf
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Returns true if `path` is this root or lies beneath it
    ///
    /// Comparison is component-wise, so `/data/left2` is not under `/data/left`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.0)
    }

    /// Get the path of `path` relative to this root
    ///
    /// # Errors
    /// Returns `DomainError::PathOutsideRoot` if `path` is not a descendant
    pub fn relative(&self, path: &Path) -> Result<PathBuf, DomainError> {
        path.strip_prefix(&self.0)
            .map(Path::to_path_buf)
            .map_err(|_| DomainError::PathOutsideRoot {
                path: path.to_path_buf(),
                root: self.0.clone(),
            })
    }

    /// Join a relative path onto this root
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if `relative` is absolute or
    /// contains `..`
    pub fn join(&self, relative: &Path) -> Result<PathBuf, DomainError> {
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(DomainError::InvalidPath(format!(
                "Invalid relative path: {}",
                relative.display()
            )));
        }

        Ok(self.0.join(relative))
    }
}

/// Normalize a path by resolving . and .. components
fn normalize_path(path: &Path) -> Result<PathBuf, DomainError> {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => normalized.push(p.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(DomainError::InvalidPath(
                        "Path escapes root via ..".to_string(),
                    ));
                }
            }
            Component::Normal(c) => normalized.push(c),
        }
    }

    Ok(normalized)
}

impl Display for SyncRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for SyncRoot {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<SyncRoot> for PathBuf {
    fn from(root: SyncRoot) -> Self {
        root.0
    }
}

impl AsRef<Path> for SyncRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
