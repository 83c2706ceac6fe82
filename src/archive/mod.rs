//! Page archival pipeline.
//!
//! One run fetches the root document, discovers and fetches everything it
//! references (following stylesheet imports), rewrites the document to point
//! at the captured bytes, and assembles the WARC records.
//!
//! Only root failures abort a run. Resources that cannot be fetched are
//! archived as failed exchanges, and a run that outlives
//! `Config::run_timeout` still produces an archive, marked degraded.

mod crawl;

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant as StdInstant;

use serde::Serialize;
use url::Url;

use crate::config::{ArchivalRequest, Config, WARC_EXTENSION, WARC_GZ_EXTENSION};
use crate::discover::{discover_document, document_base, fetch_order, ReferenceKind};
use crate::dom::Document;
use crate::error_handling::{ArchiveError, ProcessingStats, ResourceFetchError};
use crate::fetch::{FetchResult, Fetcher};
use crate::rewrite::{rewrite_document, strip_non_archivable, Resources};
use crate::urls;
use crate::warc::{
    request_record, resource_record, response_record, warcinfo_record, WarcRecord, WarcWriter,
};
use crawl::crawl_stylesheets;

/// Media types accepted for the root document.
const HTML_MIME_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Summary of a finished archival run.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    /// Where the archive was written.
    pub output_path: PathBuf,
    /// Normalized URL of the archived page.
    pub url: String,
    /// Distinct resource URLs found in the page and its stylesheets.
    pub resources_discovered: usize,
    /// Resources captured successfully.
    pub fetched: usize,
    /// Resources archived as failed exchanges.
    pub failed: usize,
    /// URLs that went to the network, root included.
    pub network_requests: usize,
    /// The run timeout expired before every resource was fetched.
    pub degraded: bool,
    pub elapsed_seconds: f64,
}

/// A captured page, held in memory until written.
#[derive(Debug)]
pub struct CapturedPage {
    /// Normalized URL of the page.
    pub url: String,
    /// The rewritten, self-contained document.
    pub html: String,
    /// Archive records in output order.
    pub records: Vec<WarcRecord>,
    pub resources_discovered: usize,
    pub fetched: usize,
    pub failed: usize,
    pub network_requests: usize,
    pub degraded: bool,
    pub stats: Arc<ProcessingStats>,
    compress: bool,
}

impl CapturedPage {
    /// Writes the archive to any writer.
    pub fn write_to<W: Write>(&self, out: W) -> io::Result<()> {
        WarcWriter::new(self.compress).write_to(out, &self.records)
    }

    /// Writes the archive to `path` atomically.
    pub fn persist(&self, path: &Path) -> Result<(), ArchiveError> {
        WarcWriter::new(self.compress).persist(path, &self.records)
    }
}

/// Archives `request.url` into `output_name` with the default configuration.
///
/// See [`new_archive_with`].
pub async fn new_archive(
    request: &ArchivalRequest,
    output_name: &str,
) -> Result<ArchiveReport, ArchiveError> {
    new_archive_with(request, output_name, &Config::default()).await
}

/// Archives `request.url` into `output_name`.
///
/// The archive extension (`.warc.gz`, or `.warc` without compression) is
/// appended unless `output_name` already carries it.
///
/// # Errors
///
/// Fails when the root document cannot be archived or the file cannot be
/// written. No file is left behind in either case.
pub async fn new_archive_with(
    request: &ArchivalRequest,
    output_name: &str,
    config: &Config,
) -> Result<ArchiveReport, ArchiveError> {
    let start_time = StdInstant::now();
    let page = capture(request, config).await?;
    let output_path = output_path(output_name, config.compress);
    page.persist(&output_path)?;

    let report = ArchiveReport {
        output_path,
        url: page.url.clone(),
        resources_discovered: page.resources_discovered,
        fetched: page.fetched,
        failed: page.failed,
        network_requests: page.network_requests,
        degraded: page.degraded,
        elapsed_seconds: start_time.elapsed().as_secs_f64(),
    };
    log::log!(
        progress_level(request),
        "Wrote {} ({} record(s), {:.2}s)",
        report.output_path.display(),
        page.records.len(),
        report.elapsed_seconds
    );
    Ok(report)
}

/// Captures a page into memory without writing it anywhere.
///
/// # Errors
///
/// - `InvalidUrl` if `request.url` is not an absolute http(s) URL
/// - `RootFetch`, `RootStatus` or `NotHtml` if the root document cannot be
///   used
/// - `Client` if the HTTP client cannot be built
pub async fn capture(
    request: &ArchivalRequest,
    config: &Config,
) -> Result<CapturedPage, ArchiveError> {
    let level = progress_level(request);
    let root_url = validate_url(&request.url)?;
    let deadline = tokio::time::Instant::now() + config.run_timeout;

    let stats = Arc::new(ProcessingStats::new());
    let fetcher = Fetcher::new(request, config, Arc::clone(&stats))?;

    log::log!(level, "Archiving {root_url}");
    let root = fetch_root(&fetcher, &root_url, deadline).await?;
    let html = root.body_text().unwrap_or_default();
    let page_url = Url::parse(&root.final_url).map_err(|e| ArchiveError::InvalidUrl {
        url: root.final_url.clone(),
        reason: e.to_string(),
    })?;

    let mut doc = Document::parse(&html);
    if config.strip_scripts {
        strip_non_archivable(&mut doc, &stats);
    }
    let base = document_base(&doc, &page_url);
    let references = discover_document(&doc, &base, &stats);
    let mut order = fetch_order(&references);
    // The root exchange is archived once, ahead of the resources, whichever
    // of its URLs the page refers to
    let mut landing = page_url.clone();
    urls::clean_url(&mut landing);
    let landing_url = String::from(landing);
    order.retain(|url| url != &root_url && url != &landing_url);
    log::log!(
        level,
        "Found {} reference(s) to {} distinct resource(s)",
        references.len(),
        order.len()
    );

    let batch = fetcher.fetch_all_until(&order, Some(deadline)).await;
    let mut degraded = batch.timed_out;
    let mut results = batch.results;

    let mut seen = HashSet::new();
    let seeds: Vec<String> = references
        .iter()
        .filter(|reference| reference.kind == ReferenceKind::Stylesheet)
        .filter(|reference| reference.is_fetchable())
        .filter(|reference| seen.insert(reference.resolved_url.clone()))
        .map(|reference| reference.resolved_url.clone())
        .collect();
    if !degraded && !seeds.is_empty() {
        let known: HashMap<String, Arc<FetchResult>> = order
            .iter()
            .cloned()
            .zip(results.iter().cloned())
            .chain([
                (root_url.clone(), Arc::clone(&root)),
                (landing_url.clone(), Arc::clone(&root)),
            ])
            .collect();
        let crawl =
            crawl_stylesheets(&fetcher, &seeds, &known, config.max_css_depth, deadline, &stats)
                .await;
        degraded |= crawl.timed_out;
        order.extend(crawl.urls);
        results.extend(crawl.results);
    }
    if degraded {
        log::warn!(
            "Run timeout of {:?} expired; archiving {root_url} with what was captured",
            config.run_timeout
        );
    }

    let mut resources = Resources::new(
        std::iter::once(Arc::clone(&root)).chain(results.iter().cloned()),
    );
    resources.render_stylesheets(&seeds, &stats);
    rewrite_document(&mut doc, &base, &references, &resources, &stats);
    let rewritten = doc.outer_html(doc.root());

    let fetched = results.iter().filter(|result| result.is_success()).count();
    let failed = results.len() - fetched;
    let records = assemble_records(&root_url, &root, &results, &rewritten, degraded);

    log::log!(
        level,
        "Captured {fetched} of {} resource(s) for {root_url} ({failed} failed)",
        results.len()
    );
    stats.log_summary();

    Ok(CapturedPage {
        url: root_url,
        html: rewritten,
        records,
        resources_discovered: order.len(),
        fetched,
        failed,
        network_requests: fetcher.network_requests(),
        degraded,
        stats,
        compress: config.compress,
    })
}

/// Archive file name for `output_name`.
pub fn output_path(output_name: &str, compress: bool) -> PathBuf {
    let extension = if compress {
        WARC_GZ_EXTENSION
    } else {
        WARC_EXTENSION
    };
    if output_name.ends_with(extension) {
        PathBuf::from(output_name)
    } else if compress && output_name.ends_with(WARC_EXTENSION) {
        PathBuf::from(format!("{output_name}.gz"))
    } else {
        PathBuf::from(format!("{output_name}{extension}"))
    }
}

fn progress_level(request: &ArchivalRequest) -> log::Level {
    if request.log_enabled {
        log::Level::Info
    } else {
        log::Level::Debug
    }
}

/// Parses and normalizes the requested page URL.
fn validate_url(raw: &str) -> Result<String, ArchiveError> {
    let invalid = |reason: &str| ArchiveError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs can be archived"));
    }
    if !url.host_str().is_some_and(|host| !host.is_empty()) {
        return Err(invalid("URL has no host"));
    }
    urls::clean_url(&mut url);
    Ok(url.into())
}

/// Fetches the root document and checks it can be archived.
async fn fetch_root(
    fetcher: &Fetcher,
    url: &str,
    deadline: tokio::time::Instant,
) -> Result<Arc<FetchResult>, ArchiveError> {
    let root = tokio::time::timeout_at(deadline, fetcher.fetch(url))
        .await
        .map_err(|_| ArchiveError::RootFetch {
            url: url.to_string(),
            source: ResourceFetchError::Timeout,
        })?;

    match (root.status, &root.error) {
        (Some(status), _) if !(200..300).contains(&status) => {
            return Err(ArchiveError::RootStatus {
                url: url.to_string(),
                status,
            });
        }
        (_, Some(error)) => {
            return Err(ArchiveError::RootFetch {
                url: url.to_string(),
                source: error.clone(),
            });
        }
        _ => {}
    }

    let mime = root.mime_type();
    if !mime
        .as_deref()
        .is_some_and(|mime| HTML_MIME_TYPES.contains(&mime))
    {
        return Err(ArchiveError::NotHtml {
            url: url.to_string(),
            content_type: root
                .content_type
                .clone()
                .unwrap_or_else(|| "none".to_string()),
        });
    }
    Ok(root)
}

/// Orders the run's exchanges into archive records.
fn assemble_records(
    root_url: &str,
    root: &FetchResult,
    results: &[Arc<FetchResult>],
    rewritten: &str,
    degraded: bool,
) -> Vec<WarcRecord> {
    let mut records = Vec::with_capacity(2 * results.len() + 4);
    records.push(warcinfo_record(root_url, degraded, None));

    let root_request = request_record(root);
    let root_response = response_record(root, &root_request.record_id);
    let root_response_id = root_response.record_id.clone();
    records.push(root_request);
    records.push(root_response);

    for result in results {
        let request = request_record(result);
        let response = response_record(result, &request.record_id);
        records.push(request);
        records.push(response);
    }

    records.push(resource_record(root_url, rewritten, &root_response_id));
    records
}
