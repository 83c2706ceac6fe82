//! Concurrent, deduplicated resource fetching.
//!
//! This module provides:
//! - A shared cache keyed by normalized URL, so each URL hits the network once
//! - A semaphore bounding simultaneous requests
//! - Per-attempt timeouts and exponential-backoff retries (`tokio-retry`)
//! - Fan-out over many URLs with an optional deadline for the whole batch
//!
//! Failures never surface as `Err`: every URL yields a `FetchResult`,
//! with `error` set when the resource could not be captured.

mod request;
mod types;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tokio::time::Instant;
use tokio_retry::RetryIf;

use crate::config::{ArchivalRequest, Config};
use crate::error_handling::{
    get_retry_strategy, update_error_stats, ArchiveError, InfoType, ProcessingStats,
    ResourceFetchError,
};
use crate::initialization::{init_client, init_semaphore};
use request::{build_request_headers, send_attempt, AttemptFailure, AttemptResponse};

// Re-export public API
pub use types::FetchResult;

type ResultCell = Arc<OnceCell<Arc<FetchResult>>>;

/// Results of a batch fetch, in the order the URLs were given.
#[derive(Debug)]
pub struct FetchBatch {
    pub results: Vec<Arc<FetchResult>>,
    /// The deadline expired; unfinished fetches were cancelled.
    pub timed_out: bool,
}

/// HTTP fetcher shared by every task of one run.
///
/// Cloning is cheap; clones share the client, the cache and the counters.
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<reqwest::Client>,
    request_headers: Arc<Vec<(String, String)>>,
    semaphore: Arc<Semaphore>,
    cache: Arc<Mutex<HashMap<String, ResultCell>>>,
    stats: Arc<ProcessingStats>,
    network_requests: Arc<AtomicUsize>,
    fetch_timeout: Duration,
    retry_max_attempts: usize,
    retry_initial_delay_ms: u64,
    max_resource_size: usize,
    progress_level: log::Level,
}

impl Fetcher {
    /// Creates a fetcher for one archival run.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Client` if the HTTP client cannot be built.
    pub fn new(
        request: &ArchivalRequest,
        config: &Config,
        stats: Arc<ProcessingStats>,
    ) -> Result<Self, ArchiveError> {
        let client = init_client(request)?;
        Ok(Fetcher {
            client,
            request_headers: Arc::new(build_request_headers(request)),
            semaphore: init_semaphore(request.max_concurrent_download),
            cache: Arc::new(Mutex::new(HashMap::new())),
            stats,
            network_requests: Arc::new(AtomicUsize::new(0)),
            fetch_timeout: config.fetch_timeout,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_initial_delay_ms: config.retry_initial_delay_ms,
            max_resource_size: config.max_resource_size,
            progress_level: if request.log_enabled {
                log::Level::Info
            } else {
                log::Level::Debug
            },
        })
    }

    /// Number of URLs that went to the network (cache misses).
    pub fn network_requests(&self) -> usize {
        self.network_requests.load(Ordering::SeqCst)
    }

    /// Headers sent with every request.
    pub fn request_headers(&self) -> &[(String, String)] {
        &self.request_headers
    }

    /// Fetches `url`, or waits for and shares an earlier fetch of it.
    pub async fn fetch(&self, url: &str) -> Arc<FetchResult> {
        let (cell, duplicate) = {
            let mut cache = self.cache.lock().await;
            match cache.get(url) {
                Some(cell) => (Arc::clone(cell), true),
                None => {
                    let cell: ResultCell = Arc::new(OnceCell::new());
                    cache.insert(url.to_string(), Arc::clone(&cell));
                    (cell, false)
                }
            }
        };
        if duplicate {
            self.stats.increment_info(InfoType::DuplicateReference);
        }

        cell.get_or_init(|| async move { Arc::new(self.fetch_uncached(url).await) })
            .await
            .clone()
    }

    /// Fetches every URL concurrently; results follow the order of `urls`.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<Arc<FetchResult>> {
        self.fetch_all_until(urls, None).await.results
    }

    /// Like [`fetch_all`](Self::fetch_all), but gives up at `deadline`.
    ///
    /// Fetches still running at the deadline are aborted and reported as
    /// `ResourceFetchError::Cancelled`; finished results are kept.
    pub async fn fetch_all_until(&self, urls: &[String], deadline: Option<Instant>) -> FetchBatch {
        let mut tasks = FuturesUnordered::new();
        let mut abort_handles = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            let fetcher = self.clone();
            let url = url.clone();
            let handle = tokio::spawn(async move {
                let result = fetcher.fetch(&url).await;
                (index, result)
            });
            abort_handles.push(handle.abort_handle());
            tasks.push(handle);
        }

        let mut slots: Vec<Option<Arc<FetchResult>>> = vec![None; urls.len()];
        let mut timed_out = false;
        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => tasks.next().await,
            };
            match next {
                Some(Ok((index, result))) => slots[index] = Some(result),
                Some(Err(e)) => log::error!("Fetch task failed: {e}"),
                None => break,
            }
        }

        if timed_out {
            for handle in &abort_handles {
                handle.abort();
            }
            let pending = slots.iter().filter(|slot| slot.is_none()).count();
            log::warn!("Run timeout reached, cancelled {pending} pending fetch(es)");
        }

        let results = slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| {
                    update_error_stats(&self.stats, &ResourceFetchError::Cancelled);
                    Arc::new(FetchResult::failed(
                        url,
                        ResourceFetchError::Cancelled,
                        self.request_headers.to_vec(),
                    ))
                })
            })
            .collect();

        FetchBatch { results, timed_out }
    }

    async fn fetch_uncached(&self, url: &str) -> FetchResult {
        self.network_requests.fetch_add(1, Ordering::SeqCst);
        log::log!(self.progress_level, "Fetching {url}");

        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let fetcher = self;
        let strategy = get_retry_strategy(self.retry_initial_delay_ms, self.retry_max_attempts);
        let outcome = RetryIf::start(
            strategy,
            move || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) > 0 {
                    fetcher.stats.increment_info(InfoType::FetchRetried);
                    log::debug!("Retrying {url}");
                }
                fetcher.attempt(url).await
            },
            |failure: &AttemptFailure| failure.error.is_retriable(),
        )
        .await;

        match outcome {
            Ok(response) => {
                log::log!(
                    self.progress_level,
                    "Fetched {url} ({}, {} bytes)",
                    response.status,
                    response.body.len()
                );
                self.from_response(url, response, None)
            }
            Err(AttemptFailure { error, response }) => {
                update_error_stats(&self.stats, &error);
                let level = if self.progress_level == log::Level::Info {
                    log::Level::Warn
                } else {
                    log::Level::Debug
                };
                log::log!(level, "Failed to fetch {url}: {error}");
                match response {
                    Some(response) => self.from_response(url, response, Some(error)),
                    None => FetchResult::failed(url, error, self.request_headers.to_vec()),
                }
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<AttemptResponse, AttemptFailure> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| AttemptFailure::from(ResourceFetchError::Cancelled))?;

        let exchange = send_attempt(
            &self.client,
            url,
            &self.request_headers,
            self.max_resource_size,
        );
        match tokio::time::timeout(self.fetch_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ResourceFetchError::Timeout.into()),
        }
    }

    fn from_response(
        &self,
        url: &str,
        response: AttemptResponse,
        error: Option<ResourceFetchError>,
    ) -> FetchResult {
        FetchResult {
            requested_url: url.to_string(),
            final_url: response.final_url,
            status: Some(response.status),
            http_version: Some(response.http_version),
            headers: response.headers,
            request_headers: self.request_headers.to_vec(),
            body: Some(response.body),
            content_type: response.content_type,
            fetched_at: chrono::Utc::now(),
            error,
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("network_requests", &self.network_requests())
            .field("fetch_timeout", &self.fetch_timeout)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
