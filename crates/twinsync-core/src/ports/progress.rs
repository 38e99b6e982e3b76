//! Progress reporting port (driven/secondary port)
//!
//! The scanner and the live mirror report liveness through this trait so
//! the core never depends on a particular UI. A reconciliation pass is one
//! task whose total is the number of files counted up front; each live
//! event is its own task with a total of one.
//!
//! ## Design Notes
//!
//! - Callbacks are synchronous because both producers run on blocking
//!   threads.
//! - `completed` is monotonically non-decreasing within a task.

// ============================================================================
// IProgressObserver trait
// ============================================================================

/// Observer of units of work being completed
///
/// ## Threading
///
/// Callbacks are invoked from blocking worker threads, so implementations
/// must be thread-safe.
pub trait IProgressObserver: Send + Sync {
    /// A task with `total` units of work is starting
    fn on_start(&self, task: &str, total: u64);

    /// `completed` out of `total` units are done
    fn on_advance(&self, task: &str, completed: u64, total: u64);

    /// The task ended after `completed` units
    ///
    /// `completed` may be less than `total` when units failed.
    fn on_finish(&self, task: &str, completed: u64, total: u64);
}

/// Observer that discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl IProgressObserver for NoopProgress {
    fn on_start(&self, _task: &str, _total: u64) {}

    fn on_advance(&self, _task: &str, _completed: u64, _total: u64) {}

    fn on_finish(&self, _task: &str, _completed: u64, _total: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_progress_is_object_safe() {
        let observer: Box<dyn IProgressObserver> = Box::new(NoopProgress);
        observer.on_start("task", 2);
        observer.on_advance("task", 1, 2);
        observer.on_finish("task", 2, 2);
    }
}
