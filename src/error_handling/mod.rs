//! Error handling and processing statistics.
//!
//! This module provides:
//! - Fatal run errors (`ArchiveError`) and per-resource fetch errors
//! - Processing statistics tracking (errors, warnings, info metrics)
//! - Retry strategy configuration and reqwest error categorization
//!
//! Only `ArchiveError` reaches callers. Fetch errors are recorded in the
//! affected resource's result, and discovery warnings are counted and logged.

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{categorize_reqwest_error, get_retry_strategy, update_error_stats};
pub use stats::ProcessingStats;
pub use types::{
    ArchiveError, ErrorType, InfoType, InitializationError, ResourceFetchError, WarcParseError,
    WarningType,
};
