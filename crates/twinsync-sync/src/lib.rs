//! twinsync Sync - Reconciliation and live mirroring engine
//!
//! Provides:
//! - One-shot, timestamp-based reconciliation of two trees
//! - Live propagation of filesystem notifications from the watched root
//!   to the mirror root
//! - A `notify`-backed watcher feeding the engine
//!
//! ## Modules
//!
//! - [`engine`] - Composition root: startup reconciliation, then live mirroring
//! - [`scanner`] - Timestamp-based tree reconciliation in one direction
//! - [`mirror`] - Translation of single change events into mirror operations
//! - [`watcher`] - OS notification adapter producing [`ChangeEvent`] values
//! - [`filesystem`] - Metadata-preserving copy, removal and move primitives
//! - [`progress`] - Tracing-backed progress observer

pub mod engine;
pub mod filesystem;
pub mod mirror;
pub mod progress;
pub mod scanner;
pub mod watcher;

use std::path::{Path, PathBuf};

use thiserror::Error;
use twinsync_core::domain::DomainError;

pub use engine::{RunStats, SyncEngine};
pub use mirror::{MirrorAction, MirrorEventHandler};
pub use progress::TracingProgress;
pub use scanner::{ReconcileReport, ReconcileSummary, ReconciliationScanner};
pub use watcher::{ChangeEvent, ChangeKind, FileWatcher};

/// Errors that can occur while reconciling a file or mirroring an event
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O operation on a concrete path failed
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        /// Short name of the failed operation, e.g. `"copy"`
        op: &'static str,
        /// The path the operation was applied to
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A path could not be mapped between roots
    #[error("Path error: {0}")]
    Path(#[from] DomainError),

    /// The mirror tree is not in the state an operation requires
    #[error("Precondition failed: {0}")]
    Precondition(String),
}

impl SyncError {
    /// Wraps an I/O error with the operation and path it concerns
    pub fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        SyncError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}
