//! Mirror engine - composition root
//!
//! The [`SyncEngine`] owns both roots and drives the two phases:
//!
//! 1. **Reconciliation**: `reconcile(left, right)` then
//!    `reconcile(right, left)`, synchronously, before anything is watched.
//! 2. **Live mirroring**: a recursive subscription on the left root feeds
//!    every [`ChangeEvent`] to the [`MirrorEventHandler`], one at a time.
//!
//! ## Shutdown
//!
//! When the cancellation token fires, [`SyncEngine::start`] stops the
//! subscription first and then applies every event it already delivered.
//! [`SyncEngine::run`] closes its channel and drains it the same way. An event being handled is never interrupted: handling runs on a
//! blocking thread that is always awaited to completion.
//!
//! Only the left root is watched. Changes made directly under the right
//! root after startup are picked up by the next startup reconciliation.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use twinsync_core::config::Config;
use twinsync_core::domain::SyncRoot;
use twinsync_core::ports::IProgressObserver;

use crate::mirror::MirrorEventHandler;
use crate::scanner::{ReconcileSummary, ReconciliationScanner};
use crate::watcher::{ChangeEvent, FileWatcher};

// ============================================================================
// RunStats
// ============================================================================

/// Counters for a live mirroring session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Events applied to the mirror (including no-op skips)
    pub handled: u64,
    /// Events whose handling failed and was logged
    pub failed: u64,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Two-root mirroring engine
///
/// ## Dependencies
///
/// - `scanner`: startup reconciliation in both directions
/// - `handler`: per-event mirroring from left to right
pub struct SyncEngine {
    left: SyncRoot,
    right: SyncRoot,
    scanner: ReconciliationScanner,
    handler: Arc<MirrorEventHandler>,
}

impl SyncEngine {
    /// Creates an engine for the given roots
    pub fn new(left: SyncRoot, right: SyncRoot, progress: Arc<dyn IProgressObserver>) -> Self {
        let scanner = ReconciliationScanner::new(Arc::clone(&progress));
        let handler = Arc::new(MirrorEventHandler::new(
            left.clone(),
            right.clone(),
            progress,
        ));

        Self {
            left,
            right,
            scanner,
            handler,
        }
    }

    /// Creates an engine from configuration, resolving both roots
    ///
    /// # Errors
    /// Returns an error if either root cannot be resolved to a directory
    pub fn from_config(config: &Config, progress: Arc<dyn IProgressObserver>) -> Result<Self> {
        let (left, right) = config
            .resolve_roots()
            .context("Failed to resolve sync roots")?;
        Ok(Self::new(left, right, progress))
    }

    /// The watched root
    pub fn left(&self) -> &SyncRoot {
        &self.left
    }

    /// The mirror root
    pub fn right(&self) -> &SyncRoot {
        &self.right
    }

    /// Runs the two-way startup reconciliation
    ///
    /// The scan itself is synchronous; it runs on a blocking thread so the
    /// runtime stays responsive to signals meanwhile.
    pub async fn reconcile(&self) -> Result<ReconcileSummary> {
        let scanner = self.scanner.clone();
        let left = self.left.clone();
        let right = self.right.clone();

        let summary = tokio::task::spawn_blocking(move || scanner.reconcile_both(&left, &right))
            .await
            .context("Reconciliation task failed")?;

        info!(
            copied = summary.copied(),
            failures = summary.failures(),
            "Startup reconciliation completed"
        );
        Ok(summary)
    }

    /// Consumes change events until cancelled or the stream ends
    ///
    /// Events are handled strictly one after another. After cancellation
    /// the channel is closed and already queued events are drained.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<ChangeEvent>,
        shutdown: CancellationToken,
    ) -> RunStats {
        let mut stats = RunStats::default();

        if self.mirror_until_cancelled(&mut events, &shutdown, &mut stats).await {
            events.close();
            self.drain(events, &mut stats).await;
        }

        stats
    }

    /// Reconciles, subscribes to the left root, and mirrors until shutdown
    ///
    /// On shutdown the subscription is stopped first; events it had already
    /// delivered, including a pending move out of the tree, are then
    /// drained before returning.
    ///
    /// # Errors
    /// Returns an error if reconciliation cannot run or the subscription
    /// cannot be established. Per-file and per-event failures are logged
    /// and never returned.
    pub async fn start(&self, buffer: usize, shutdown: CancellationToken) -> Result<RunStats> {
        self.reconcile().await?;

        if shutdown.is_cancelled() {
            info!("Shutdown requested during reconciliation, not starting watcher");
            return Ok(RunStats::default());
        }

        let (mut watcher, mut events) = FileWatcher::new(buffer)?;
        watcher.watch(self.left.as_path())?;

        let mut stats = RunStats::default();
        let cancelled = self
            .mirror_until_cancelled(&mut events, &shutdown, &mut stats)
            .await;

        if let Err(e) = watcher.unwatch(self.left.as_path()) {
            warn!(error = %e, "Failed to stop watch cleanly");
        }
        // Dropping the watcher ends the forwarding thread, which closes the
        // channel once its last event is sent.
        drop(watcher);

        if cancelled {
            self.drain(events, &mut stats).await;
        }

        Ok(stats)
    }

    /// Handles events until cancellation (returns true) or until the
    /// channel closes (returns false)
    async fn mirror_until_cancelled(
        &self,
        events: &mut mpsc::Receiver<ChangeEvent>,
        shutdown: &CancellationToken,
        stats: &mut RunStats,
    ) -> bool {
        info!(
            watch = %self.left,
            mirror = %self.right,
            "Live mirroring started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, draining pending events");
                    return true;
                }

                event = events.recv() => {
                    match event {
                        Some(change) => self.dispatch(change, stats).await,
                        None => {
                            info!("Change channel closed, live mirroring stopped");
                            return false;
                        }
                    }
                }
            }
        }
    }

    /// Applies every event still in the channel until all senders are gone
    async fn drain(&self, mut events: mpsc::Receiver<ChangeEvent>, stats: &mut RunStats) {
        let mut drained = 0u64;
        while let Some(change) = events.recv().await {
            self.dispatch(change, stats).await;
            drained += 1;
        }

        info!(
            drained,
            handled = stats.handled,
            failed = stats.failed,
            "Live mirroring stopped"
        );
    }

    /// Handles one event on a blocking thread and waits for it to finish
    async fn dispatch(&self, event: ChangeEvent, stats: &mut RunStats) {
        debug!(kind = %event.kind(), path = %event.source_path().display(), "Dispatching event");

        let handler = Arc::clone(&self.handler);
        match tokio::task::spawn_blocking(move || handler.handle(&event)).await {
            Ok(Some(_)) => stats.handled += 1,
            Ok(None) => stats.failed += 1,
            Err(e) => {
                error!(error = %e, "Event handler task panicked");
                stats.failed += 1;
            }
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use tempfile::TempDir;
    use twinsync_core::config::ConfigBuilder;
    use twinsync_core::ports::NoopProgress;

    use super::*;

    fn engine() -> (TempDir, SyncEngine) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("left")).unwrap();
        fs::create_dir(dir.path().join("right")).unwrap();
        let config = ConfigBuilder::new()
            .sync_left(dir.path().join("left"))
            .sync_right(dir.path().join("right"))
            .build();
        let engine = SyncEngine::from_config(&config, Arc::new(NoopProgress)).unwrap();
        (dir, engine)
    }

    #[test]
    fn test_from_config_fails_for_missing_roots() {
        let config = ConfigBuilder::new()
            .sync_left("/nonexistent/left".into())
            .sync_right("/nonexistent/right".into())
            .build();
        assert!(SyncEngine::from_config(&config, Arc::new(NoopProgress)).is_err());
    }

    #[tokio::test]
    async fn test_run_exits_on_channel_close() {
        let (_dir, engine) = engine();
        let (tx, rx) = mpsc::channel(16);
        drop(tx);

        let stats = tokio::time::timeout(
            Duration::from_secs(2),
            engine.run(rx, CancellationToken::new()),
        )
        .await
        .expect("run should exit when channel closes");

        assert_eq!(stats, RunStats::default());
    }

    #[tokio::test]
    async fn test_run_drains_queued_events_after_cancel() {
        let (_dir, engine) = engine();
        let left = engine.left().as_path().to_path_buf();
        let right = engine.right().as_path().to_path_buf();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(left.join(name), name.as_bytes()).unwrap();
        }

        let (tx, rx) = mpsc::channel(16);
        for name in ["a.txt", "b.txt", "c.txt"] {
            tx.send(ChangeEvent::Created(left.join(name))).await.unwrap();
        }
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // Sender still alive: only the close-and-drain path can end the run.
        let stats = tokio::time::timeout(Duration::from_secs(5), engine.run(rx, shutdown))
            .await
            .expect("run should return after draining");

        assert_eq!(stats.handled, 3);
        for name in ["a.txt", "b.txt", "c.txt"] {
            assert!(right.join(name).exists(), "{name} was not mirrored");
        }
        assert!(tx.send(ChangeEvent::Deleted(left.join("a.txt"))).await.is_err());
    }

    #[tokio::test]
    async fn test_start_returns_early_when_cancelled_during_reconcile() {
        let (_dir, engine) = engine();
        fs::write(engine.left().as_path().join("f.txt"), b"x").unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let stats = engine.start(16, shutdown).await.unwrap();

        assert_eq!(stats, RunStats::default());
        assert!(engine.right().as_path().join("f.txt").exists());
    }
}
