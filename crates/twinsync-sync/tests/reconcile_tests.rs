//! Integration tests for two-way startup reconciliation
//!
//! Each test builds a fresh pair of trees in a temporary directory and
//! drives `ReconciliationScanner` (or the engine) against them.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use filetime::FileTime;
use tempfile::TempDir;

use twinsync_core::domain::SyncRoot;
use twinsync_core::ports::NoopProgress;
use twinsync_sync::{ReconciliationScanner, SyncEngine};

// ============================================================================
// Test helpers
// ============================================================================

/// Create `left/` and `right/` under a fresh temp directory
fn setup() -> (TempDir, SyncRoot, SyncRoot) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir(dir.path().join("left")).unwrap();
    fs::create_dir(dir.path().join("right")).unwrap();
    let left = SyncRoot::resolve(&dir.path().join("left")).unwrap();
    let right = SyncRoot::resolve(&dir.path().join("right")).unwrap();
    (dir, left, right)
}

/// Write `content` at `root/relative` with the given mtime (seconds)
fn write(root: &SyncRoot, relative: &str, content: &[u8], mtime: i64) {
    let path = root.as_path().join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::metadata(path).unwrap())
}

fn scanner() -> ReconciliationScanner {
    ReconciliationScanner::new(Arc::new(NoopProgress))
}

// ============================================================================
// Scenario tests
// ============================================================================

#[test]
fn test_newer_file_and_missing_file_converge() {
    let (_dir, left, right) = setup();
    write(&left, "notes/todo.txt", b"buy milk", 2_000_000);
    write(&right, "notes/todo.txt", b"old list", 1_000_000);
    write(&right, "photo.png", b"\x89PNG", 1_500_000);

    let summary = scanner().reconcile_both(&left, &right);

    assert_eq!(summary.left_to_right.copied, 1);
    assert_eq!(summary.right_to_left.copied, 1);
    assert_eq!(summary.failures(), 0);

    let todo_b = right.as_path().join("notes/todo.txt");
    assert_eq!(fs::read(&todo_b).unwrap(), b"buy milk");
    assert_eq!(mtime(&todo_b), FileTime::from_unix_time(2_000_000, 0));

    let photo_a = left.as_path().join("photo.png");
    assert_eq!(fs::read(&photo_a).unwrap(), b"\x89PNG");
    assert_eq!(mtime(&photo_a), FileTime::from_unix_time(1_500_000, 0));

    // The right-to-left pass does not touch the freshly copied todo.txt
    assert_eq!(
        fs::read(left.as_path().join("notes/todo.txt")).unwrap(),
        b"buy milk"
    );
}

#[test]
fn test_second_run_copies_nothing() {
    let (_dir, left, right) = setup();
    write(&left, "a.txt", b"a", 1_000_000);
    write(&left, "deep/nested/b.txt", b"b", 1_000_100);
    write(&right, "c.txt", b"c", 1_000_200);

    let first = scanner().reconcile_both(&left, &right);
    assert_eq!(first.copied(), 3);

    let second = scanner().reconcile_both(&left, &right);
    assert_eq!(second.copied(), 0);
    assert_eq!(second.left_to_right.up_to_date, 3);
    assert_eq!(second.right_to_left.up_to_date, 3);
}

#[test]
fn test_trees_hold_same_relative_paths_after_reconcile() {
    let (_dir, left, right) = setup();
    write(&left, "x/1.txt", b"1", 1_000_000);
    write(&left, "x/y/2.txt", b"2", 1_000_000);
    write(&right, "z/3.txt", b"3", 1_000_000);

    scanner().reconcile_both(&left, &right);

    for relative in ["x/1.txt", "x/y/2.txt", "z/3.txt"] {
        let a = fs::read(left.as_path().join(relative)).unwrap();
        let b = fs::read(right.as_path().join(relative)).unwrap();
        assert_eq!(a, b, "{relative} differs between trees");
    }
}

#[test]
fn test_equal_mtimes_keep_destination_content() {
    let (_dir, left, right) = setup();
    write(&left, "same.txt", b"left version", 1_000_000);
    write(&right, "same.txt", b"right version", 1_000_000);

    let summary = scanner().reconcile_both(&left, &right);

    assert_eq!(summary.copied(), 0);
    assert_eq!(
        fs::read(right.as_path().join("same.txt")).unwrap(),
        b"right version"
    );
}

#[test]
fn test_failed_copy_is_skipped_and_scan_continues() {
    let (_dir, left, right) = setup();
    write(&left, "ok.txt", b"ok", 1_000_000);
    write(&left, "blocked.txt", b"blocked", 1_000_000);
    // An older, non-empty directory in the way makes the final rename fail
    let obstacle = right.as_path().join("blocked.txt");
    fs::create_dir_all(obstacle.join("inner")).unwrap();
    filetime::set_file_mtime(&obstacle, FileTime::from_unix_time(1, 0)).unwrap();

    let report = scanner().reconcile(&left, &right);

    assert_eq!(report.copied, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("blocked.txt"));
    assert!(right.as_path().join("ok.txt").is_file());
}

#[tokio::test]
async fn test_engine_reconcile_runs_both_directions() {
    let (_dir, left, right) = setup();
    write(&left, "from_left.txt", b"L", 1_000_000);
    write(&right, "from_right.txt", b"R", 1_000_000);

    let engine = SyncEngine::new(left.clone(), right.clone(), Arc::new(NoopProgress));
    let summary = engine.reconcile().await.unwrap();

    assert_eq!(summary.copied(), 2);
    assert!(right.as_path().join("from_left.txt").exists());
    assert!(left.as_path().join("from_right.txt").exists());
}
