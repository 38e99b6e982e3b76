//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including path validation failures and root containment errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path is not a descendant of the root it was expected under
    #[error("Path {} is not within root {}", path.display(), root.display())]
    PathOutsideRoot {
        /// The offending path
        path: PathBuf,
        /// The root it was expected to live under
        root: PathBuf,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
