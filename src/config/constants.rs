//! Configuration constants.
//!
//! This module defines the constants used throughout the archiver, including
//! timeouts, size limits, retry parameters and WARC identity strings.

use std::time::Duration;

/// Default number of simultaneous in-flight resource fetches.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOAD: usize = 10;

/// Per-fetch timeout (one attempt, redirects included).
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Overall timeout for the resource-fetching phase of one run.
///
/// When it expires, pending fetches are cancelled and the archive is written
/// from whatever completed, flagged as degraded.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// TCP connection timeout in seconds
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default User-Agent string for HTTP requests.
///
/// Callers normally supply their own through `ArchivalRequest::user_agent`;
/// this is used when that field is empty.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "page_warc/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alexwoolford/page_warc)"
);

/// `Accept` header sent with every request.
pub const ACCEPT_HEADER: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

// Response and body size limits
/// Maximum size of a single captured resource in bytes (25MB).
/// Larger bodies are abandoned mid-stream and recorded as failed fetches.
pub const MAX_RESOURCE_SIZE: usize = 25 * 1024 * 1024;

/// Maximum number of response headers recorded per exchange.
pub const MAX_HEADER_COUNT: usize = 100;

// Redirect handling
/// Maximum number of redirect hops to follow
pub const MAX_REDIRECT_HOPS: usize = 10;

// Retry strategy
/// Initial delay in milliseconds before first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 5;
/// Maximum number of attempts per resource (initial attempt + retries)
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// Stylesheet recursion
/// Maximum `@import` nesting followed from a top-level stylesheet.
pub const MAX_CSS_IMPORT_DEPTH: usize = 5;

// WARC output
/// Version line written at the top of every record.
pub const WARC_VERSION: &str = "WARC/1.0";
/// Software identity written into the `warcinfo` record.
pub const WARC_SOFTWARE: &str = concat!("page_warc/", env!("CARGO_PKG_VERSION"));
/// File extension of uncompressed archives.
pub const WARC_EXTENSION: &str = ".warc";
/// File extension of gzip-compressed archives.
pub const WARC_GZ_EXTENSION: &str = ".warc.gz";

// HTTP status codes (for clarity and consistency)
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// Synthesized status for resources that produced no response at all.
pub const HTTP_STATUS_BAD_GATEWAY: u16 = 502;
/// Synthesized status for resources whose every attempt timed out.
pub const HTTP_STATUS_GATEWAY_TIMEOUT: u16 = 504;
