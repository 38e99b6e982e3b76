//! Live mirroring of single change events
//!
//! [`MirrorEventHandler`] translates one [`ChangeEvent`] observed under the
//! watched root into the equivalent operation under the mirror root. It
//! only ever writes to the mirror root and keeps no state between events.
//!
//! | event | action on the mirror |
//! |---|---|
//! | created directory | create directory (idempotent), then copy its contents |
//! | created / modified file | copy with metadata, overwriting |
//! | modified directory | nothing |
//! | deleted | remove directory recursively or file; nothing if absent |
//! | moved | rename mapped origin to mapped destination; origin must exist |
//!
//! [`MirrorEventHandler::handle`] is the per-event failure boundary: errors
//! are logged with the event kind and source path, then swallowed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use twinsync_core::domain::{PathMapper, SyncRoot};
use twinsync_core::ports::IProgressObserver;
use walkdir::WalkDir;

use crate::filesystem::{
    copy_with_metadata, entry_exists, is_temp_file, move_path, remove_path, RemoveOutcome,
};
use crate::watcher::ChangeEvent;
use crate::SyncError;

/// What the handler did to the mirror tree for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorAction {
    DirectoryCreated(PathBuf),
    FileCopied(PathBuf),
    DirectoryRemoved(PathBuf),
    FileRemoved(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
    /// Nothing to do; the reason is a static description
    Skipped(&'static str),
}

/// Applies change events from the watched root to the mirror root
pub struct MirrorEventHandler {
    mapper: PathMapper,
    progress: Arc<dyn IProgressObserver>,
}

impl MirrorEventHandler {
    /// Creates a handler mirroring `watch_root` into `mirror_root`
    pub fn new(
        watch_root: SyncRoot,
        mirror_root: SyncRoot,
        progress: Arc<dyn IProgressObserver>,
    ) -> Self {
        Self {
            mapper: PathMapper::new(watch_root, mirror_root),
            progress,
        }
    }

    /// The root events are observed under
    pub fn watch_root(&self) -> &SyncRoot {
        self.mapper.from_root()
    }

    /// The root operations are applied to
    pub fn mirror_root(&self) -> &SyncRoot {
        self.mapper.to_root()
    }

    /// Handles one event inside its own failure boundary
    ///
    /// Returns the action taken, or `None` if handling failed. Failures are
    /// logged and never propagate, so the caller can move on to the next
    /// event.
    pub fn handle(&self, event: &ChangeEvent) -> Option<MirrorAction> {
        let task = format!("Handling {} event", event.kind());
        self.progress.on_start(&task, 1);

        match self.apply(event) {
            Ok(action) => {
                self.progress.on_advance(&task, 1, 1);
                self.progress.on_finish(&task, 1, 1);
                Some(action)
            }
            Err(err) => {
                error!(
                    kind = %event.kind(),
                    path = %event.source_path().display(),
                    error = %err,
                    "Error handling event"
                );
                self.progress.on_finish(&task, 0, 1);
                None
            }
        }
    }

    /// Applies one event to the mirror root
    ///
    /// # Errors
    /// - `SyncError::Path` if an event path is outside the watched root
    /// - `SyncError::Io` if the filesystem operation fails
    /// - `SyncError::Precondition` if a move origin is missing from the
    ///   mirror, or the event would replace or delete the mirror root itself
    pub fn apply(&self, event: &ChangeEvent) -> Result<MirrorAction, SyncError> {
        match event {
            ChangeEvent::Created(path) => {
                let target = self.mapper.map(path)?;
                if path.is_dir() {
                    std::fs::create_dir_all(&target)
                        .map_err(|e| SyncError::io("create directory", &target, e))?;
                    let copied = self.copy_contents(path);
                    info!(
                        src = %path.display(),
                        dest = %target.display(),
                        copied,
                        "Directory created"
                    );
                    Ok(MirrorAction::DirectoryCreated(target))
                } else {
                    self.copy_file(path, target, "File created")
                }
            }

            ChangeEvent::Modified(path) => {
                if path.is_dir() {
                    return Ok(MirrorAction::Skipped("directory modification is not mirrored"));
                }
                let target = self.mapper.map(path)?;
                self.copy_file(path, target, "File modified")
            }

            ChangeEvent::Deleted(path) => {
                let target = self.mapper.map(path)?;
                self.guard_mirror_root(&target, "delete")?;
                match remove_path(&target).map_err(|e| SyncError::io("remove", &target, e))? {
                    RemoveOutcome::RemovedDirectory => {
                        info!(dest = %target.display(), "Directory deleted");
                        Ok(MirrorAction::DirectoryRemoved(target))
                    }
                    RemoveOutcome::RemovedFile => {
                        info!(dest = %target.display(), "File deleted");
                        Ok(MirrorAction::FileRemoved(target))
                    }
                    RemoveOutcome::Absent => {
                        Ok(MirrorAction::Skipped("already absent from mirror"))
                    }
                }
            }

            ChangeEvent::Moved { from, to } => {
                let mapped_from = self.mapper.map(from)?;
                let mapped_to = self.mapper.map(to)?;
                self.guard_mirror_root(&mapped_from, "move")?;
                self.guard_mirror_root(&mapped_to, "move onto")?;

                if !entry_exists(&mapped_from) {
                    return Err(SyncError::Precondition(format!(
                        "move origin {} does not exist in mirror",
                        mapped_from.display()
                    )));
                }

                move_path(&mapped_from, &mapped_to)
                    .map_err(|e| SyncError::io("move", &mapped_from, e))?;
                info!(
                    src = %from.display(),
                    dest = %mapped_to.display(),
                    "Moved"
                );
                Ok(MirrorAction::Moved {
                    from: mapped_from,
                    to: mapped_to,
                })
            }
        }
    }

    /// Copies a file into the mirror, creating missing parent directories
    fn copy_file(
        &self,
        src: &Path,
        target: PathBuf,
        message: &'static str,
    ) -> Result<MirrorAction, SyncError> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::io("create directory", parent, e))?;
        }
        copy_with_metadata(src, &target).map_err(|e| SyncError::io("copy", src, e))?;
        info!(src = %src.display(), dest = %target.display(), "{}", message);
        Ok(MirrorAction::FileCopied(target))
    }

    /// Mirrors everything below a newly arrived directory
    ///
    /// A directory renamed into the watched tree arrives with its contents
    /// and produces no events for them. Entries that fail are logged and
    /// skipped. Returns the number of files copied.
    fn copy_contents(&self, dir: &Path) -> u64 {
        let mut copied = 0;

        for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "Skipping unreadable entry");
                    continue;
                }
            };
            let file_type = entry.file_type();
            let regular = file_type.is_file() || file_type.is_dir();
            if !regular || is_temp_file(entry.path()) {
                debug!(path = %entry.path().display(), "Skipping entry");
                continue;
            }

            match self.mirror_entry(entry.path(), file_type.is_dir()) {
                Ok(true) => copied += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "Skipping entry");
                }
            }
        }

        copied
    }

    /// Creates or copies one entry; returns true if a file was copied
    fn mirror_entry(&self, path: &Path, is_dir: bool) -> Result<bool, SyncError> {
        let target = self.mapper.map(path)?;
        if is_dir {
            std::fs::create_dir_all(&target)
                .map_err(|e| SyncError::io("create directory", &target, e))?;
            return Ok(false);
        }
        self.copy_file(path, target, "File created")?;
        Ok(true)
    }

    /// Rejects destructive operations aimed at the mirror root itself
    fn guard_mirror_root(&self, target: &Path, op: &str) -> Result<(), SyncError> {
        if target == self.mirror_root().as_path() {
            return Err(SyncError::Precondition(format!(
                "refusing to {op} mirror root {}",
                target.display()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use twinsync_core::ports::NoopProgress;

    use super::*;

    struct Fixture {
        _dir: TempDir,
        handler: MirrorEventHandler,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir(dir.path().join("left")).unwrap();
            fs::create_dir(dir.path().join("right")).unwrap();
            let left = SyncRoot::resolve(&dir.path().join("left")).unwrap();
            let right = SyncRoot::resolve(&dir.path().join("right")).unwrap();
            Self {
                handler: MirrorEventHandler::new(left, right, Arc::new(NoopProgress)),
                _dir: dir,
            }
        }

        fn left(&self, rel: &str) -> PathBuf {
            self.handler.watch_root().as_path().join(rel)
        }

        fn right(&self, rel: &str) -> PathBuf {
            self.handler.mirror_root().as_path().join(rel)
        }
    }

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    // ------------------------------------------------------------------
    // Created
    // ------------------------------------------------------------------

    #[test]
    fn test_created_file_is_copied() {
        let f = Fixture::new();
        write(&f.left("x.txt"), b"content");

        let action = f.handler.apply(&ChangeEvent::Created(f.left("x.txt"))).unwrap();

        assert_eq!(action, MirrorAction::FileCopied(f.right("x.txt")));
        assert_eq!(fs::read(f.right("x.txt")).unwrap(), b"content");
    }

    #[test]
    fn test_created_directory_is_idempotent() {
        let f = Fixture::new();
        fs::create_dir(f.left("dir")).unwrap();
        fs::create_dir(f.right("dir")).unwrap();

        let action = f.handler.apply(&ChangeEvent::Created(f.left("dir"))).unwrap();

        assert_eq!(action, MirrorAction::DirectoryCreated(f.right("dir")));
        assert!(f.right("dir").is_dir());
    }

    #[test]
    fn test_created_directory_copies_existing_contents() {
        let f = Fixture::new();
        write(&f.left("pkg/inner/data.txt"), b"payload");
        write(&f.left("pkg/top.txt"), b"top");
        fs::create_dir_all(f.left("pkg/empty")).unwrap();

        let action = f.handler.apply(&ChangeEvent::Created(f.left("pkg"))).unwrap();

        assert_eq!(action, MirrorAction::DirectoryCreated(f.right("pkg")));
        assert_eq!(fs::read(f.right("pkg/inner/data.txt")).unwrap(), b"payload");
        assert_eq!(fs::read(f.right("pkg/top.txt")).unwrap(), b"top");
        assert!(f.right("pkg/empty").is_dir());
    }

    #[test]
    fn test_created_directory_skips_staging_files() {
        let f = Fixture::new();
        write(&f.left("pkg/a.txt.twinsync.tmp"), b"partial");

        f.handler.apply(&ChangeEvent::Created(f.left("pkg"))).unwrap();

        assert!(f.right("pkg").is_dir());
        assert!(!f.right("pkg/a.txt.twinsync.tmp").exists());
    }

    #[test]
    fn test_created_file_in_unmirrored_directory_creates_parents() {
        let f = Fixture::new();
        write(&f.left("new/dir/file.txt"), b"nested");

        f.handler
            .apply(&ChangeEvent::Created(f.left("new/dir/file.txt")))
            .unwrap();

        assert_eq!(fs::read(f.right("new/dir/file.txt")).unwrap(), b"nested");
    }

    #[test]
    fn test_created_then_vanished_file_fails() {
        let f = Fixture::new();
        let result = f.handler.apply(&ChangeEvent::Created(f.left("gone.txt")));
        assert!(matches!(result, Err(SyncError::Io { op: "copy", .. })));
        assert!(!f.right("gone.txt").exists());
    }

    // ------------------------------------------------------------------
    // Modified
    // ------------------------------------------------------------------

    #[test]
    fn test_modified_file_overwrites_mirror() {
        let f = Fixture::new();
        write(&f.left("doc.txt"), b"v2");
        write(&f.right("doc.txt"), b"v1");

        f.handler.apply(&ChangeEvent::Modified(f.left("doc.txt"))).unwrap();

        assert_eq!(fs::read(f.right("doc.txt")).unwrap(), b"v2");
    }

    #[test]
    fn test_modified_directory_is_skipped() {
        let f = Fixture::new();
        fs::create_dir(f.left("dir")).unwrap();

        let action = f.handler.apply(&ChangeEvent::Modified(f.left("dir"))).unwrap();

        assert!(matches!(action, MirrorAction::Skipped(_)));
        assert!(!f.right("dir").exists());
    }

    // ------------------------------------------------------------------
    // Deleted
    // ------------------------------------------------------------------

    #[test]
    fn test_deleted_file_is_removed() {
        let f = Fixture::new();
        write(&f.right("old.txt"), b"bye");

        let action = f.handler.apply(&ChangeEvent::Deleted(f.left("old.txt"))).unwrap();

        assert_eq!(action, MirrorAction::FileRemoved(f.right("old.txt")));
        assert!(!f.right("old.txt").exists());
    }

    #[test]
    fn test_deleted_directory_is_removed_recursively() {
        let f = Fixture::new();
        write(&f.right("tree/a/b.txt"), b"b");
        write(&f.right("tree/c.txt"), b"c");

        let action = f.handler.apply(&ChangeEvent::Deleted(f.left("tree"))).unwrap();

        assert_eq!(action, MirrorAction::DirectoryRemoved(f.right("tree")));
        assert!(!f.right("tree").exists());
    }

    #[test]
    fn test_deleted_absent_is_noop() {
        let f = Fixture::new();
        let action = f.handler.apply(&ChangeEvent::Deleted(f.left("never.txt"))).unwrap();
        assert!(matches!(action, MirrorAction::Skipped(_)));
    }

    #[test]
    fn test_deleting_watch_root_never_wipes_mirror() {
        let f = Fixture::new();
        write(&f.right("keep.txt"), b"keep");
        let root = f.handler.watch_root().as_path().to_path_buf();

        let result = f.handler.apply(&ChangeEvent::Deleted(root));

        assert!(matches!(result, Err(SyncError::Precondition(_))));
        assert!(f.right("keep.txt").exists());
    }

    // ------------------------------------------------------------------
    // Moved
    // ------------------------------------------------------------------

    #[test]
    fn test_moved_renames_in_mirror() {
        let f = Fixture::new();
        write(&f.right("old.txt"), b"payload");

        let action = f
            .handler
            .apply(&ChangeEvent::Moved {
                from: f.left("old.txt"),
                to: f.left("new.txt"),
            })
            .unwrap();

        assert_eq!(
            action,
            MirrorAction::Moved {
                from: f.right("old.txt"),
                to: f.right("new.txt"),
            }
        );
        assert!(!f.right("old.txt").exists());
        assert_eq!(fs::read(f.right("new.txt")).unwrap(), b"payload");
    }

    #[test]
    fn test_moved_directory_carries_contents() {
        let f = Fixture::new();
        write(&f.right("src/inner/file.txt"), b"inside");

        f.handler
            .apply(&ChangeEvent::Moved {
                from: f.left("src"),
                to: f.left("dst"),
            })
            .unwrap();

        assert_eq!(fs::read(f.right("dst/inner/file.txt")).unwrap(), b"inside");
        assert!(!f.right("src").exists());
    }

    #[test]
    fn test_moved_missing_origin_is_precondition_error() {
        let f = Fixture::new();
        write(&f.right("bystander.txt"), b"untouched");

        let result = f.handler.apply(&ChangeEvent::Moved {
            from: f.left("missing.txt"),
            to: f.left("target.txt"),
        });

        assert!(matches!(result, Err(SyncError::Precondition(_))));
        assert!(!f.right("target.txt").exists());
        assert_eq!(fs::read(f.right("bystander.txt")).unwrap(), b"untouched");
    }

    // ------------------------------------------------------------------
    // Failure boundary
    // ------------------------------------------------------------------

    #[test]
    fn test_outside_path_is_rejected() {
        let f = Fixture::new();
        let result = f
            .handler
            .apply(&ChangeEvent::Created(PathBuf::from("/definitely/elsewhere.txt")));
        assert!(matches!(result, Err(SyncError::Path(_))));
    }

    #[test]
    fn test_handle_swallows_errors_and_continues() {
        let f = Fixture::new();
        write(&f.left("good.txt"), b"good");

        let failed = f.handler.handle(&ChangeEvent::Modified(f.left("vanished.txt")));
        let succeeded = f.handler.handle(&ChangeEvent::Created(f.left("good.txt")));

        assert!(failed.is_none());
        assert_eq!(succeeded, Some(MirrorAction::FileCopied(f.right("good.txt"))));
    }
}
