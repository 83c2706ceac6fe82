//! Configuration types.
//!
//! This module defines the archival request handed in by callers and the
//! tuning knobs of a pipeline run.

use std::collections::HashMap;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::{
    DEFAULT_MAX_CONCURRENT_DOWNLOAD, DEFAULT_USER_AGENT, FETCH_TIMEOUT, MAX_CSS_IMPORT_DEPTH,
    MAX_RESOURCE_SIZE, RETRY_INITIAL_DELAY_MS, RETRY_MAX_ATTEMPTS, RUN_TIMEOUT,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// A cookie sent with every request of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Input of a single archival run.
///
/// Created by the caller and read-only for the duration of the run.
///
/// # Examples
///
/// ```no_run
/// use page_warc::ArchivalRequest;
///
/// let request = ArchivalRequest {
///     url: "https://example.com/article".to_string(),
///     log_enabled: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ArchivalRequest {
    /// Page to archive
    pub url: String,

    /// HTTP User-Agent header value (empty means `DEFAULT_USER_AGENT`)
    pub user_agent: String,

    /// Additional request headers, applied to every fetch
    pub extra_headers: HashMap<String, String>,

    /// Cookies, sent in this order as a single `Cookie` header
    pub cookies: Vec<Cookie>,

    /// Maximum simultaneous resource fetches
    pub max_concurrent_download: usize,

    /// Emit per-URL progress lines at info level
    pub log_enabled: bool,
}

impl Default for ArchivalRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extra_headers: HashMap::new(),
            cookies: Vec::new(),
            max_concurrent_download: DEFAULT_MAX_CONCURRENT_DOWNLOAD,
            log_enabled: false,
        }
    }
}

impl ArchivalRequest {
    /// User agent to send, falling back to the crate default when unset.
    pub fn effective_user_agent(&self) -> &str {
        if self.user_agent.trim().is_empty() {
            DEFAULT_USER_AGENT
        } else {
            &self.user_agent
        }
    }

    /// `Cookie` header value, or `None` when no cookies were given.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Tuning of a pipeline run (no CLI dependencies).
#[derive(Debug, Clone)]
pub struct Config {
    /// Timeout of a single fetch attempt
    pub fetch_timeout: Duration,

    /// Timeout of the whole resource-fetching phase
    pub run_timeout: Duration,

    /// Attempts per resource, initial attempt included
    pub retry_max_attempts: usize,

    /// Delay before the first retry, in milliseconds
    pub retry_initial_delay_ms: u64,

    /// Largest body captured per resource, in bytes
    pub max_resource_size: usize,

    /// Maximum `@import` nesting followed
    pub max_css_depth: usize,

    /// Remove scripts and tracking pixels from the archived document
    pub strip_scripts: bool,

    /// gzip every record (`.warc.gz`)
    pub compress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch_timeout: FETCH_TIMEOUT,
            run_timeout: RUN_TIMEOUT,
            retry_max_attempts: RETRY_MAX_ATTEMPTS,
            retry_initial_delay_ms: RETRY_INITIAL_DELAY_MS,
            max_resource_size: MAX_RESOURCE_SIZE,
            max_css_depth: MAX_CSS_IMPORT_DEPTH,
            strip_scripts: false,
            compress: true,
        }
    }
}
