//! Error type definitions.
//!
//! This module defines the fatal run errors, the non-fatal per-resource fetch
//! errors, and the counters used for processing statistics.

use std::path::PathBuf;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Terminal errors of an archival run.
///
/// Any of these means no archive artifact exists.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The request URL is not an absolute http(s) URL.
    #[error("invalid archival request URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The root document could not be fetched at all.
    #[error("failed to fetch root document {url}: {source}")]
    RootFetch {
        url: String,
        #[source]
        source: ResourceFetchError,
    },

    /// The root document answered with a non-success status.
    #[error("root document {url} returned HTTP {status}")]
    RootStatus { url: String, status: u16 },

    /// The root document is not an HTML page.
    #[error("root document {url} is not HTML (content-type: {content_type})")]
    NotHtml { url: String, content_type: String },

    /// The HTTP client could not be built.
    #[error("HTTP client initialization error: {0}")]
    Client(#[from] ReqwestError),

    /// Serializing or persisting the archive failed.
    #[error("failed to write archive {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Malformed WARC input found by the record reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WarcParseError {
    #[error("expected WARC version line at byte {offset}")]
    MissingVersion { offset: usize },

    #[error("malformed header line at byte {offset}: {line:?}")]
    MalformedHeader { offset: usize, line: String },

    #[error("record at byte {offset} has no valid Content-Length")]
    MissingContentLength { offset: usize },

    /// The block is shorter than its declared length.
    #[error("record at byte {offset} is truncated")]
    Truncated { offset: usize },

    #[error("record at byte {offset} is not terminated by CRLF CRLF")]
    MissingTerminator { offset: usize },

    #[error("gzip decoding failed: {0}")]
    Gzip(String),
}

/// Why a single resource could not be captured.
///
/// Recorded inside the resource's `FetchResult`; never aborts a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceFetchError {
    /// The server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Every attempt timed out.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The redirect chain was too long or invalid.
    #[error("redirect error: {0}")]
    Redirect(String),

    /// The body stream broke off.
    #[error("body error: {0}")]
    Body(String),

    /// The body exceeded the configured size cap.
    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The request itself could not be built or sent.
    #[error("request error: {0}")]
    Request(String),

    /// The run timeout expired before this fetch completed.
    #[error("cancelled by run timeout")]
    Cancelled,
}

impl ResourceFetchError {
    /// Whether another attempt might succeed.
    ///
    /// Timeouts, connection failures, 5xx and 429 are transient; other 4xx
    /// answers, size overruns and redirect loops are permanent.
    pub fn is_retriable(&self) -> bool {
        match self {
            ResourceFetchError::Status(code) => {
                *code == crate::config::HTTP_STATUS_TOO_MANY_REQUESTS || (500..600).contains(code)
            }
            ResourceFetchError::Timeout
            | ResourceFetchError::Connect(_)
            | ResourceFetchError::Body(_)
            | ResourceFetchError::Request(_) => true,
            ResourceFetchError::Redirect(_)
            | ResourceFetchError::TooLarge { .. }
            | ResourceFetchError::Cancelled => false,
        }
    }
}

/// Types of errors that can occur while capturing resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    HttpRequestTimeoutError,
    HttpRequestConnectError,
    HttpRequestRedirectError,
    HttpRequestBodyError,
    HttpRequestOtherError,
    HttpRequestTooManyRequests,
    HttpRequestNotFound,   // 404 Not Found
    HttpRequestClientError, // Other 4xx
    HttpRequestServerError, // 5xx
    ResourceTooLarge,
    FetchCancelled,
}

/// Types of warnings raised while discovering references.
///
/// Each one marks a fragment that was skipped; discovery carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum WarningType {
    CssParseRecovery,    // Unterminated or empty url()/@import token
    SrcsetParseRecovery, // srcset candidate without a usable URL
    UnresolvableUrl,     // Attribute URL that could not be made absolute
    CssImportDepthLimit, // @import chain deeper than the configured limit
    CssImportCycle,      // @import pointing back into its own chain
}

/// Informational metrics of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    ResourceEmbedded,
    DuplicateReference,
    FetchRetried,
    ElementStripped,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::HttpRequestTimeoutError => "HTTP request timeout",
            ErrorType::HttpRequestConnectError => "HTTP connect error",
            ErrorType::HttpRequestRedirectError => "HTTP redirect error",
            ErrorType::HttpRequestBodyError => "HTTP body error",
            ErrorType::HttpRequestOtherError => "HTTP request error",
            ErrorType::HttpRequestTooManyRequests => "Too many requests (429)",
            ErrorType::HttpRequestNotFound => "Not found (404)",
            ErrorType::HttpRequestClientError => "Client error (4xx)",
            ErrorType::HttpRequestServerError => "Server error (5xx)",
            ErrorType::ResourceTooLarge => "Resource too large",
            ErrorType::FetchCancelled => "Cancelled by run timeout",
        }
    }
}

impl std::fmt::Display for WarningType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WarningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningType::CssParseRecovery => "Malformed CSS reference skipped",
            WarningType::SrcsetParseRecovery => "Malformed srcset candidate skipped",
            WarningType::UnresolvableUrl => "Unresolvable URL left as-is",
            WarningType::CssImportDepthLimit => "CSS @import depth limit reached",
            WarningType::CssImportCycle => "CSS @import cycle broken",
        }
    }
}

impl std::fmt::Display for InfoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InfoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoType::ResourceEmbedded => "Resource embedded",
            InfoType::DuplicateReference => "Duplicate reference served from cache",
            InfoType::FetchRetried => "Fetch attempt retried",
            InfoType::ElementStripped => "Element stripped",
        }
    }
}
