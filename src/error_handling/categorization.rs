//! Error categorization and retry strategy.
//!
//! Maps `reqwest` failures onto `ResourceFetchError` and statistics counters,
//! and builds the backoff schedule used between fetch attempts.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use super::stats::ProcessingStats;
use super::types::{ErrorType, ResourceFetchError};

/// Creates an exponential backoff retry strategy.
///
/// The iterator yields one delay per retry, so it is limited to
/// `max_attempts - 1` items: the initial attempt is not a retry.
pub fn get_retry_strategy(
    initial_delay_ms: u64,
    max_attempts: usize,
) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(initial_delay_ms.max(1))
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
        .take(max_attempts.saturating_sub(1))
}

/// Categorizes a `reqwest::Error` into a `ResourceFetchError`.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> ResourceFetchError {
    if let Some(status) = error.status() {
        return ResourceFetchError::Status(status.as_u16());
    }

    if error.is_timeout() {
        ResourceFetchError::Timeout
    } else if error.is_redirect() {
        ResourceFetchError::Redirect(error.to_string())
    } else if error.is_connect() {
        ResourceFetchError::Connect(error.to_string())
    } else if error.is_body() || error.is_decode() {
        ResourceFetchError::Body(error.to_string())
    } else {
        ResourceFetchError::Request(error.to_string())
    }
}

/// Maps a fetch failure onto its statistics counter.
pub fn error_type_for(error: &ResourceFetchError) -> ErrorType {
    match error {
        ResourceFetchError::Status(404) => ErrorType::HttpRequestNotFound,
        ResourceFetchError::Status(code) if *code == crate::config::HTTP_STATUS_TOO_MANY_REQUESTS => {
            ErrorType::HttpRequestTooManyRequests
        }
        ResourceFetchError::Status(code) if (400..500).contains(code) => {
            ErrorType::HttpRequestClientError
        }
        ResourceFetchError::Status(code) if (500..600).contains(code) => {
            ErrorType::HttpRequestServerError
        }
        ResourceFetchError::Status(_) => ErrorType::HttpRequestOtherError,
        ResourceFetchError::Timeout => ErrorType::HttpRequestTimeoutError,
        ResourceFetchError::Connect(_) => ErrorType::HttpRequestConnectError,
        ResourceFetchError::Redirect(_) => ErrorType::HttpRequestRedirectError,
        ResourceFetchError::Body(_) => ErrorType::HttpRequestBodyError,
        ResourceFetchError::TooLarge { .. } => ErrorType::ResourceTooLarge,
        ResourceFetchError::Request(_) => ErrorType::HttpRequestOtherError,
        ResourceFetchError::Cancelled => ErrorType::FetchCancelled,
    }
}

/// Records a final (post-retry) fetch failure in the statistics.
pub fn update_error_stats(stats: &ProcessingStats, error: &ResourceFetchError) {
    stats.increment_error(error_type_for(error));
}
