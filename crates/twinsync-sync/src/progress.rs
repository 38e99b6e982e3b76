//! Tracing-backed progress reporting
//!
//! [`TracingProgress`] implements the core progress port by emitting
//! structured tracing events. Multi-unit tasks (reconciliation passes) log
//! their start and end at `info` and a progress line every
//! [`REPORT_EVERY`] files at `debug`; single-unit tasks (live events) log
//! at `debug` only, since the handler already logs what it did.

use tracing::{debug, info};
use twinsync_core::ports::IProgressObserver;

/// Interval, in completed units, between progress lines of long tasks
pub const REPORT_EVERY: u64 = 100;

/// Progress observer that writes to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl IProgressObserver for TracingProgress {
    fn on_start(&self, task: &str, total: u64) {
        if total > 1 {
            info!(task, total, "Started");
        } else {
            debug!(task, total, "Started");
        }
    }

    fn on_advance(&self, task: &str, completed: u64, total: u64) {
        if completed % REPORT_EVERY == 0 {
            debug!(task, completed, total, "Progress");
        }
    }

    fn on_finish(&self, task: &str, completed: u64, total: u64) {
        if total > 1 {
            info!(task, completed, total, "Finished");
        } else {
            debug!(task, completed, total, "Finished");
        }
    }
}
