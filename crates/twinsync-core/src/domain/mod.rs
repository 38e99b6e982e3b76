//! Domain entities and business logic
//!
//! This module contains the core domain types for twinsync:
//! - Newtypes for the two mirrored roots
//! - Path translation between the roots
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod path_map;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use path_map::{map_path, PathMapper};
