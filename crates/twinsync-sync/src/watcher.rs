//! File watching for the live mirror phase
//!
//! Provides a [`FileWatcher`] that wraps the `notify` crate to monitor the
//! watched root recursively, converting raw OS events into [`ChangeEvent`]
//! values delivered over a bounded channel.
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue / FSEvents
//!       │
//!       ▼
//!  FileWatcher  ──→  mpsc::channel  ──→  SyncEngine  ──→  MirrorEventHandler
//! ```
//!
//! Raw notify events first pass through a forwarding thread that pairs the
//! two halves of a rename. A `Name(From)` that is not followed by its
//! `Name(To)` within [`MOVE_PAIR_WINDOW`] means the entry left the watched
//! tree, and is reported as [`ChangeEvent::Deleted`].
//!
//! Both channels are bounded; when the engine falls behind, the notify
//! thread blocks instead of dropping events.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

// ============================================================================
// ChangeEvent enum
// ============================================================================

/// A filesystem change observed under the watched root
///
/// These events are the internal representation used by the engine,
/// decoupled from the `notify` crate's raw event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A new file or directory was created at the given path
    Created(PathBuf),
    /// An existing file or directory was modified (content or metadata)
    Modified(PathBuf),
    /// A file or directory was deleted from the given path
    Deleted(PathBuf),
    /// A file or directory was renamed/moved within the watched tree
    Moved {
        /// The original path before the move
        from: PathBuf,
        /// The new path after the move
        to: PathBuf,
    },
}

/// Discriminant of a [`ChangeEvent`], used in log lines and progress labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Moved => "moved",
        };
        write!(f, "{}", s)
    }
}

impl ChangeEvent {
    /// Returns the path the event originated from
    ///
    /// For moves, this is the original (pre-move) path.
    pub fn source_path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) => p,
            ChangeEvent::Modified(p) => p,
            ChangeEvent::Deleted(p) => p,
            ChangeEvent::Moved { from, .. } => from,
        }
    }

    /// Returns the kind of this event
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Created(_) => ChangeKind::Created,
            ChangeEvent::Modified(_) => ChangeKind::Modified,
            ChangeEvent::Deleted(_) => ChangeKind::Deleted,
            ChangeEvent::Moved { .. } => ChangeKind::Moved,
        }
    }
}

// ============================================================================
// FileWatcher struct
// ============================================================================

/// Watches a directory tree for changes using the OS-native mechanism
///
/// On Linux this uses inotify. The watcher converts raw OS events into
/// [`ChangeEvent`] values and sends them through an mpsc channel.
///
/// ## Usage
///
/// ```ignore
/// let (mut watcher, rx) = FileWatcher::new(1024)?;
/// watcher.watch(left.as_path())?;
/// // rx.recv().await to get events
/// watcher.unwatch(left.as_path())?;
/// ```
pub struct FileWatcher {
    /// The underlying notify watcher instance
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Creates a new `FileWatcher` whose channel holds up to `buffer` events
    ///
    /// Returns the watcher and a receiver channel for consuming change events.
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new(buffer: usize) -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (event_tx, event_rx) = mpsc::channel::<ChangeEvent>(buffer);
        let (raw_tx, raw_rx) = std_mpsc::sync_channel::<notify::Event>(buffer);

        info!(buffer, "Initializing file watcher");

        std::thread::Builder::new()
            .name("twinsync-watch".into())
            .spawn(move || forward_events(raw_rx, event_tx))
            .context("Failed to spawn event forwarding thread")?;

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if raw_tx.send(event).is_err() {
                        debug!("Event forwarding stopped, dropping notification");
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, event_rx))
    }

    /// Starts watching a directory recursively for filesystem changes
    ///
    /// # Errors
    /// Returns an error if the path cannot be watched (e.g., does not exist,
    /// insufficient permissions, or inotify watch limit reached)
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Starting recursive watch");

        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))
    }

    /// Stops watching a directory
    ///
    /// After this call, no further events will be generated for the given path.
    ///
    /// # Errors
    /// Returns an error if the path was not being watched
    pub fn unwatch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Stopping watch");

        self.watcher
            .unwatch(path)
            .with_context(|| format!("Failed to unwatch path: {}", path.display()))
    }
}

// ============================================================================
// Rename pairing
// ============================================================================

/// How long a `Name(From)` waits for its `Name(To)` before it counts as a
/// move out of the watched tree
pub const MOVE_PAIR_WINDOW: Duration = Duration::from_millis(100);

/// Runs on the forwarding thread until the watcher is dropped or the
/// engine stops receiving
fn forward_events(raw: std_mpsc::Receiver<notify::Event>, tx: mpsc::Sender<ChangeEvent>) {
    let mut pairing = MovePairing::new(MOVE_PAIR_WINDOW);

    loop {
        let received = match pairing.deadline() {
            Some(deadline) => raw.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => raw.recv().map_err(|_| std_mpsc::RecvTimeoutError::Disconnected),
        };

        let (changes, finished) = match received {
            Ok(event) => (pairing.push(&event, Instant::now()), false),
            Err(std_mpsc::RecvTimeoutError::Timeout) => (pairing.expire(Instant::now()), false),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => (pairing.flush(), true),
        };

        for change in changes {
            if tx.blocking_send(change).is_err() {
                debug!("Change receiver closed, stopping event forwarding");
                return;
            }
        }

        if finished {
            debug!("File watcher dropped, stopping event forwarding");
            return;
        }
    }
}

/// A `Name(From)` still waiting for the other half of its rename
#[derive(Debug)]
struct PendingMove {
    tracker: Option<usize>,
    path: PathBuf,
    since: Instant,
}

/// Pairs rename halves and turns unpaired departures into deletions
///
/// inotify queues the two halves of a rename next to each other, so at
/// most one departure is ever pending: any other event settles it.
#[derive(Debug)]
struct MovePairing {
    pending: Option<PendingMove>,
    window: Duration,
}

impl MovePairing {
    fn new(window: Duration) -> Self {
        Self {
            pending: None,
            window,
        }
    }

    /// When the pending departure, if any, expires
    fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.since + self.window)
    }

    /// Feeds one raw event and returns the changes it settles, in order
    fn push(&mut self, event: &notify::Event, now: Instant) -> Vec<ChangeEvent> {
        let mut changes = Vec::new();

        match &event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                changes.extend(self.flush());
                if let Some(path) = event.paths.first() {
                    debug!(path = %path.display(), "Holding Rename(From) for its pair");
                    self.pending = Some(PendingMove {
                        tracker: event.tracker(),
                        path: path.clone(),
                        since: now,
                    });
                }
                return changes;
            }

            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                if self.is_pending(event.tracker(), None) {
                    // The `Both` event that follows carries the move
                    debug!(paths = ?event.paths, "Rename(To) paired with pending Rename(From)");
                    return changes;
                }
            }

            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if self.is_pending(event.tracker(), event.paths.first()) {
                    self.pending = None;
                }
            }

            _ => {}
        }

        changes.extend(self.flush());
        changes.extend(map_notify_event(event));
        changes
    }

    /// Settles the pending departure if its window has elapsed
    fn expire(&mut self, now: Instant) -> Vec<ChangeEvent> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Vec::new(),
        }
    }

    /// Settles the pending departure, if any, as a deletion
    fn flush(&mut self) -> Vec<ChangeEvent> {
        match self.pending.take() {
            Some(pending) => {
                debug!(
                    path = %pending.path.display(),
                    "Unpaired Rename(From), treating as Deleted"
                );
                vec![ChangeEvent::Deleted(pending.path)]
            }
            None => Vec::new(),
        }
    }

    fn is_pending(&self, tracker: Option<usize>, path: Option<&PathBuf>) -> bool {
        self.pending.as_ref().is_some_and(|p| {
            (tracker.is_some() && p.tracker == tracker) || path.is_some_and(|path| *path == p.path)
        })
    }
}

// ============================================================================
// Event mapping - notify::Event → ChangeEvent
// ============================================================================

/// Converts a `notify::Event` into our internal `ChangeEvent`
///
/// Maps the notify event kinds as follows:
/// - `Create(*)` -> `ChangeEvent::Created`
/// - `Modify(Name(Both))` with 2 paths -> `ChangeEvent::Moved`
/// - `Modify(Name(To))` -> `ChangeEvent::Created` (entry arrived by rename)
/// - `Modify(Name(From))` -> ignored; [`MovePairing`] decides what it means
/// - `Remove(*)` -> `ChangeEvent::Deleted`
/// - Other `Modify(*)` -> `ChangeEvent::Modified`
///
/// Returns `None` for events that have no associated paths or that should
/// be ignored (e.g., access events).
fn map_notify_event(event: &notify::Event) -> Option<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped Create event");
            Some(ChangeEvent::Created(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if paths.len() >= 2 {
                let from = paths[0].clone();
                let to = paths[1].clone();
                debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "Mapped Rename event"
                );
                Some(ChangeEvent::Moved { from, to })
            } else {
                // Without both ends the move cannot be replayed; the
                // surviving path is the one that now exists.
                let path = paths.first()?;
                debug!(path = %path.display(), "Rename with single path, treating as Created");
                Some(ChangeEvent::Created(path.clone()))
            }
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped Rename(To) event");
            Some(ChangeEvent::Created(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            debug!(paths = ?paths, "Ignoring Rename(From) event");
            None
        }

        EventKind::Remove(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "Mapped Remove event");
            Some(ChangeEvent::Deleted(path.clone()))
        }

        EventKind::Modify(_) => {
            // Data, metadata and unspecified modifications
            let path = paths.first()?;
            debug!(path = %path.display(), kind = ?event.kind, "Mapped Modify event");
            Some(ChangeEvent::Modified(path.clone()))
        }

        // Ignore access events and other event types
        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            None
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
