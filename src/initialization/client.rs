//! HTTP client initialization.
//!
//! This module builds the single `reqwest::Client` shared by every fetch of
//! a run. Per-request concerns (extra headers, cookies, attempt timeout) are
//! applied by the fetcher, not here.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::ClientBuilder;

use crate::config::{ArchivalRequest, ACCEPT_HEADER, MAX_REDIRECT_HOPS, TCP_CONNECT_TIMEOUT_SECS};

/// Initializes the HTTP client for an archival run.
///
/// Creates a `reqwest::Client` configured with:
/// - User-Agent header from the request (or the crate default when blank)
/// - `Accept` header advertising HTML and common resource types
/// - Redirect following enabled (up to `MAX_REDIRECT_HOPS` hops)
/// - TCP connect timeout of `TCP_CONNECT_TIMEOUT_SECS`
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_client(request: &ArchivalRequest) -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));

    let client = ClientBuilder::new()
        .user_agent(request.effective_user_agent())
        .default_headers(default_headers)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECT_HOPS))
        .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
        .build()?;
    Ok(Arc::new(client))
}
