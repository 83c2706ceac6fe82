//! Process-wide resource setup.
//!
//! This module provides functions to initialize the shared resources of a run:
//! - HTTP client (user agent, redirect limit, connect timeout)
//! - Logger (plain or JSON output)
//! - Fetch concurrency semaphore
//!
//! All initialization functions return proper error types for error handling.

mod client;
mod logger;

use std::sync::Arc;

use tokio::sync::Semaphore;

// Re-export public API
pub use client::init_client;
pub use logger::init_logger_with;

/// Initializes a semaphore for controlling fetch concurrency.
///
/// A `count` of zero is raised to one so a run can always make progress.
pub fn init_semaphore(count: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(count.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_semaphore_never_zero() {
        assert_eq!(init_semaphore(0).available_permits(), 1);
        assert_eq!(init_semaphore(4).available_permits(), 4);
    }
}
