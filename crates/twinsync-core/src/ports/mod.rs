//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces the core depends on, but whose implementations
//! live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IProgressObserver`] - Progress reporting for scans and live events

pub mod progress;

pub use progress::{IProgressObserver, NoopProgress};
