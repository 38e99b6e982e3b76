//! twinsync Core - Configuration and domain rules
//!
//! This crate contains:
//! - **Configuration** - `Config` loaded from YAML, validated at startup
//! - **Domain types** - `SyncRoot`, `RootSide`, `DomainError`
//! - **Path mapping** - `PathMapper` translating paths between the two roots
//! - **Port definitions** - `IProgressObserver` for progress reporting
//!
//! # Architecture
//!
//! The domain module contains pure logic with no filesystem side effects
//! beyond root resolution. Adapters (copying, walking, watching) live in
//! `twinsync-sync`.

pub mod config;
pub mod domain;
pub mod ports;
