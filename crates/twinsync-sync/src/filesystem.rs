//! Local filesystem primitives
//!
//! Synchronous `std::fs` operations used by both the scanner and the live
//! mirror. Callers in async context run them through
//! `tokio::task::spawn_blocking`.
//!
//! ## Design Decisions
//!
//! - **Atomic copies**: content is written to a temporary sibling, stamped
//!   with the source's access and modification times, then renamed over the
//!   target. A failed copy never leaves a half-written target behind.
//! - **Permission bits** are carried over by `std::fs::copy`.
//! - **Timestamps** are compared and preserved at full `filetime`
//!   resolution, so a copied file compares equal to its source.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::debug;

/// Suffix of the temporary file a copy is staged in
pub const TEMP_SUFFIX: &str = ".twinsync.tmp";

/// Result of [`remove_path`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// A directory and all its descendants were removed
    RemovedDirectory,
    /// A single file (or symlink) was removed
    RemovedFile,
    /// Nothing existed at the path
    Absent,
}

/// Returns true for staging files created by [`copy_with_metadata`]
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEMP_SUFFIX))
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut p = target.as_os_str().to_owned();
    p.push(TEMP_SUFFIX);
    PathBuf::from(p)
}

/// Last modification time of `path`
pub fn modified_time(path: &Path) -> io::Result<FileTime> {
    let metadata = fs::metadata(path)?;
    Ok(FileTime::from_last_modification_time(&metadata))
}

/// Copies `src` over `dst`, preserving permission bits and timestamps
///
/// Returns the number of bytes copied.
pub fn copy_with_metadata(src: &Path, dst: &Path) -> io::Result<u64> {
    let metadata = fs::metadata(src)?;
    let tmp_path = temp_path_for(dst);

    let bytes = match stage_copy(src, &tmp_path, dst, &metadata) {
        Ok(bytes) => bytes,
        Err(e) => {
            // The staging file may never have been created.
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
    };

    debug!(src = %src.display(), dst = %dst.display(), bytes, "copy complete");
    Ok(bytes)
}

/// Copies `src` into `tmp`, stamps it with the source times, then renames
/// it over `dst`
fn stage_copy(src: &Path, tmp: &Path, dst: &Path, metadata: &fs::Metadata) -> io::Result<u64> {
    let bytes = fs::copy(src, tmp)?;
    filetime::set_file_times(
        tmp,
        FileTime::from_last_access_time(metadata),
        FileTime::from_last_modification_time(metadata),
    )?;
    fs::rename(tmp, dst)?;
    Ok(bytes)
}

/// Removes whatever exists at `path`: a directory recursively, or a file
///
/// Symlinks are removed themselves, never followed.
pub fn remove_path(path: &Path) -> io::Result<RemoveOutcome> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RemoveOutcome::Absent),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        debug!(path = %path.display(), "removing directory recursively");
        fs::remove_dir_all(path)?;
        Ok(RemoveOutcome::RemovedDirectory)
    } else {
        debug!(path = %path.display(), "removing file");
        fs::remove_file(path)?;
        Ok(RemoveOutcome::RemovedFile)
    }
}

/// Returns true if anything (file, directory or dangling symlink) exists at `path`
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Renames `from` to `to`
pub fn move_path(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)?;
    debug!(from = %from.display(), to = %to.display(), "move complete");
    Ok(())
}

// ============================================================================
// Unit tests
// ============================================================================
