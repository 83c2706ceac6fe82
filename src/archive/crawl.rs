//! Stylesheet crawl.
//!
//! Fetched stylesheets are scanned level by level: every `url(...)` and
//! `@import` of one level is fetched in a single batch, and the imported
//! sheets form the next level. Imports deeper than the configured limit are
//! left unfetched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::time::Instant;
use url::Url;

use crate::discover::{discover_stylesheet, CssReferenceKind};
use crate::error_handling::{ProcessingStats, WarningType};
use crate::fetch::{FetchResult, Fetcher};

/// Everything the crawl fetched beyond the page's own references.
#[derive(Debug, Default)]
pub(super) struct StylesheetCrawl {
    /// Newly fetched URLs, in discovery order.
    pub urls: Vec<String>,
    pub results: Vec<Arc<FetchResult>>,
    pub timed_out: bool,
}

/// Crawls the stylesheets in `seeds`.
///
/// `known` holds the results fetched so far; URLs already in it are not
/// fetched again.
pub(super) async fn crawl_stylesheets(
    fetcher: &Fetcher,
    seeds: &[String],
    known: &HashMap<String, Arc<FetchResult>>,
    max_depth: usize,
    deadline: Instant,
    stats: &ProcessingStats,
) -> StylesheetCrawl {
    let mut crawl = StylesheetCrawl::default();
    let mut results: HashMap<String, Arc<FetchResult>> = known.clone();
    let mut scheduled: HashSet<String> = known.keys().cloned().collect();
    let mut crawled: HashSet<String> = seeds.iter().cloned().collect();
    let mut level: Vec<String> = seeds.to_vec();
    let mut depth = 0;

    while !level.is_empty() {
        let mut to_fetch = Vec::new();
        let mut next_level = Vec::new();

        for sheet_url in &level {
            let Some(sheet) = results.get(sheet_url).filter(|result| result.is_success()) else {
                continue;
            };
            let Some(text) = sheet.body_text() else {
                continue;
            };
            let Ok(base) = Url::parse(&sheet.final_url) else {
                continue;
            };

            for reference in discover_stylesheet(&text, &base, stats) {
                let url = reference.resolved_url;
                if reference.kind == CssReferenceKind::Import {
                    if depth + 1 > max_depth {
                        log::debug!("Not following @import of {url} beyond depth {max_depth}");
                        stats.increment_warning(WarningType::CssImportDepthLimit);
                        continue;
                    }
                    if crawled.insert(url.clone()) {
                        next_level.push(url.clone());
                    }
                }
                if scheduled.insert(url.clone()) {
                    to_fetch.push(url);
                }
            }
        }

        if !to_fetch.is_empty() {
            let batch = fetcher.fetch_all_until(&to_fetch, Some(deadline)).await;
            for (url, result) in to_fetch.iter().zip(&batch.results) {
                results.insert(url.clone(), Arc::clone(result));
            }
            crawl.urls.extend(to_fetch);
            crawl.results.extend(batch.results);
            if batch.timed_out {
                crawl.timed_out = true;
                break;
            }
        }

        level = next_level;
        depth += 1;
    }

    crawl
}
