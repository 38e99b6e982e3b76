//! Timestamp-based reconciliation of two trees
//!
//! [`ReconciliationScanner::reconcile`] walks the source root and copies
//! every regular file into the destination root when the destination copy
//! is missing or strictly older. Running it left→right and then
//! right→left converges both trees on the newest version of every file.
//!
//! ## Failure semantics
//!
//! Each file is its own unit of work: an I/O failure is logged, recorded in
//! the [`ReconcileReport`], and the walk continues. Nothing is rolled back.
//!
//! ## Limitations
//!
//! Only directories that contain at least one regular file are recreated on
//! the other side; empty directories are not propagated.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filetime::FileTime;
use serde::Serialize;
use tracing::{debug, info, warn};
use twinsync_core::domain::{PathMapper, RootSide, SyncRoot};
use twinsync_core::ports::IProgressObserver;
use walkdir::WalkDir;

use crate::filesystem::{copy_with_metadata, is_temp_file, modified_time};
use crate::SyncError;

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one directional reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Root that was walked
    pub source: PathBuf,
    /// Root that received copies
    pub destination: PathBuf,
    /// Number of regular files counted before the pass started
    pub total: u64,
    /// Files copied because the destination was missing or older
    pub copied: u64,
    /// Files whose destination copy was already as new as the source
    pub up_to_date: u64,
    /// One message per file or directory that could not be processed
    pub failures: Vec<String>,
}

impl ReconcileReport {
    /// Returns true if nothing failed during the pass
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a full two-way reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub left_to_right: ReconcileReport,
    pub right_to_left: ReconcileReport,
}

impl ReconcileSummary {
    /// Total files copied in both directions
    pub fn copied(&self) -> u64 {
        self.left_to_right.copied + self.right_to_left.copied
    }

    /// Total failures in both directions
    pub fn failures(&self) -> usize {
        self.left_to_right.failures.len() + self.right_to_left.failures.len()
    }
}

/// What happened to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Copied,
    UpToDate,
}

// ============================================================================
// ReconciliationScanner
// ============================================================================

/// One-shot tree reconciler
///
/// Holds no state between passes: every decision is recomputed from the
/// filesystem at the moment it is made.
#[derive(Clone)]
pub struct ReconciliationScanner {
    progress: Arc<dyn IProgressObserver>,
}

impl ReconciliationScanner {
    /// Creates a scanner reporting progress to `progress`
    pub fn new(progress: Arc<dyn IProgressObserver>) -> Self {
        Self { progress }
    }

    /// Runs `reconcile(left, right)` followed by `reconcile(right, left)`
    ///
    /// The order matters: a file newer on the left is pushed right first,
    /// so the second pass sees it as in sync.
    pub fn reconcile_both(&self, left: &SyncRoot, right: &SyncRoot) -> ReconcileSummary {
        let root = |side: RootSide| match side {
            RootSide::Left => left,
            RootSide::Right => right,
        };

        let mut summary = ReconcileSummary::default();
        for side in [RootSide::Left, RootSide::Right] {
            debug!(from = %side, to = %side.opposite(), "Reconciling");
            let report = self.reconcile(root(side), root(side.opposite()));
            match side {
                RootSide::Left => summary.left_to_right = report,
                RootSide::Right => summary.right_to_left = report,
            }
        }
        summary
    }

    /// Copies every regular file under `src` into `dest` where the
    /// destination copy is missing or older
    pub fn reconcile(&self, src: &SyncRoot, dest: &SyncRoot) -> ReconcileReport {
        let task = format!("Syncing {src} -> {dest}");
        let total = count_files(src.as_path());
        let mapper = PathMapper::new(src.clone(), dest.clone());

        info!(src = %src, dest = %dest, total, "Starting reconciliation pass");
        self.progress.on_start(&task, total);

        let mut report = ReconcileReport {
            source: src.as_path().to_path_buf(),
            destination: dest.as_path().to_path_buf(),
            total,
            ..Default::default()
        };
        let mut done: u64 = 0;

        for entry in WalkDir::new(src.as_path()).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                    report.failures.push(format!("walk {}: {err}", path.display()));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if !file_type.is_file() {
                if file_type.is_symlink() {
                    debug!(path = %entry.path().display(), "Skipping symlink");
                }
                continue;
            }
            if is_temp_file(entry.path()) {
                debug!(path = %entry.path().display(), "Skipping staging file");
                continue;
            }

            match reconcile_file(&mapper, entry.path()) {
                Ok(FileOutcome::Copied) => report.copied += 1,
                Ok(FileOutcome::UpToDate) => report.up_to_date += 1,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "Skipping file");
                    report.failures.push(err.to_string());
                }
            }

            // The upfront count can be stale if files appear mid-walk.
            done += 1;
            self.progress.on_advance(&task, done, total.max(done));
        }

        self.progress.on_finish(&task, done, total.max(done));
        info!(
            src = %src,
            dest = %dest,
            copied = report.copied,
            up_to_date = report.up_to_date,
            failed = report.failures.len(),
            "Reconciliation pass completed"
        );

        report
    }
}

/// Counts regular files under `root`, ignoring unreadable entries
fn count_files(root: &Path) -> u64 {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && !is_temp_file(e.path()))
        .count() as u64
}

/// Brings one file's counterpart under `dest` up to date
fn reconcile_file(mapper: &PathMapper, src_file: &Path) -> Result<FileOutcome, SyncError> {
    let relative = mapper.relative(src_file)?;
    let dest_file = mapper.map(src_file)?;

    if let Some(parent) = dest_file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SyncError::io("create directory", parent, e))?;
    }

    if !needs_copy(src_file, &dest_file)? {
        debug!(path = %relative.display(), "Already in sync");
        return Ok(FileOutcome::UpToDate);
    }

    copy_with_metadata(src_file, &dest_file).map_err(|e| SyncError::io("copy", src_file, e))?;
    info!(
        src = %src_file.display(),
        dest = %dest_file.display(),
        "Copied file"
    );
    Ok(FileOutcome::Copied)
}

/// True if `dest` is missing or strictly older than `src`
///
/// Equal timestamps count as in sync, which makes a second pass a no-op.
fn needs_copy(src: &Path, dest: &Path) -> Result<bool, SyncError> {
    let dest_mtime = match std::fs::metadata(dest) {
        Ok(m) => FileTime::from_last_modification_time(&m),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(SyncError::io("stat", dest, e)),
    };
    let src_mtime = modified_time(src).map_err(|e| SyncError::io("stat", src, e))?;

    Ok(src_mtime > dest_mtime)
}

// ============================================================================
// Unit tests
// ============================================================================
