//! Archiver configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, limits, retry parameters)
//! - The archival request and run configuration types

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{ArchivalRequest, Config, Cookie, LogFormat, LogLevel};
