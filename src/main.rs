//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `page_warc` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::collections::HashMap;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use page_warc::config::{DEFAULT_MAX_CONCURRENT_DOWNLOAD, FETCH_TIMEOUT, RUN_TIMEOUT};
use page_warc::initialization::init_logger_with;
use page_warc::{new_archive_with, ArchivalRequest, Config, Cookie, LogFormat, LogLevel};

/// Archive a web page and everything it references into a WARC file.
#[derive(Debug, Parser)]
#[command(name = "page_warc", version, about)]
struct Opt {
    /// URL of the page to archive
    url: String,

    /// Output file name; `.warc.gz` (or `.warc`) is appended when missing
    #[arg(short, long, default_value = "archive")]
    output: String,

    /// User-Agent header to send
    #[arg(long)]
    user_agent: Option<String>,

    /// Extra request header, as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Cookie sent with every request, as `name=value` (repeatable, ordered)
    #[arg(short = 'b', long = "cookie", value_parser = parse_cookie)]
    cookies: Vec<Cookie>,

    /// Maximum number of simultaneous downloads
    #[arg(short = 'c', long, default_value_t = DEFAULT_MAX_CONCURRENT_DOWNLOAD)]
    max_concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = FETCH_TIMEOUT.as_secs())]
    timeout_seconds: u64,

    /// Overall time budget for fetching resources, in seconds
    #[arg(long, default_value_t = RUN_TIMEOUT.as_secs())]
    run_timeout_seconds: u64,

    /// Remove scripts, script preloads and tracking pixels from the page
    #[arg(long)]
    strip_scripts: bool,

    /// Write an uncompressed `.warc` file
    #[arg(long)]
    no_gzip: bool,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format: plain or json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    let (name, header_value) = value
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {value:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in {value:?}"));
    }
    Ok((name.to_string(), header_value.trim().to_string()))
}

fn parse_cookie(value: &str) -> Result<Cookie, String> {
    let (name, cookie_value) = value
        .split_once('=')
        .ok_or_else(|| format!("expected `name=value`, got {value:?}"))?;
    Ok(Cookie::new(name.trim(), cookie_value.trim()))
}

impl Opt {
    fn request(&self) -> ArchivalRequest {
        let mut request = ArchivalRequest {
            url: self.url.clone(),
            extra_headers: self.headers.iter().cloned().collect::<HashMap<_, _>>(),
            cookies: self.cookies.clone(),
            max_concurrent_download: self.max_concurrency,
            log_enabled: true,
            ..Default::default()
        };
        if let Some(user_agent) = &self.user_agent {
            request.user_agent = user_agent.clone();
        }
        request
    }

    fn config(&self) -> Config {
        Config {
            fetch_timeout: Duration::from_secs(self.timeout_seconds),
            run_timeout: Duration::from_secs(self.run_timeout_seconds),
            strip_scripts: self.strip_scripts,
            compress: !self.no_gzip,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    match new_archive_with(&opt.request(), &opt.output, &opt.config()).await {
        Ok(report) => {
            println!(
                "✅ Archived {} ({} of {} resource{} captured, {} failed) in {:.1}s",
                report.url,
                report.fetched,
                report.resources_discovered,
                if report.resources_discovered == 1 { "" } else { "s" },
                report.failed,
                report.elapsed_seconds
            );
            if report.degraded {
                println!("⚠️  Run timeout expired; the archive is incomplete");
            }
            println!("Archive saved in {}", report.output_path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("page_warc error: {:#}", anyhow::Error::from(e));
            process::exit(1);
        }
    }
}
