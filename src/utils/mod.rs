//! Utility functions shared across the crate
//!
//! This module contains common helpers for formatting, path handling
//! and application directories.

mod format;
mod path;
mod system;

pub use format::*;
pub use path::*;
pub use system::*;
