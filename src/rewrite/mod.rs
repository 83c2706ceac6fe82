//! Document rewriting.
//!
//! Points every discovered reference at captured content:
//! - captured resources become `data:` URIs of their bytes
//! - stylesheets become `data:` URIs of their rewritten CSS
//! - failed fetches and links keep their absolute URL
//!
//! Rewriting only touches the attribute values and style text that carry
//! references; element order and other attributes stay as parsed.

mod css;
mod strip;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::Engine;
use url::Url;

use crate::discover::{
    format_srcset, parse_srcset, rewrite_stylesheet, CssReferenceKind, ReferenceKind,
    ReferenceLocation, ResourceReference,
};
use crate::dom::{Document, NodeId};
use crate::error_handling::{InfoType, ProcessingStats};
use crate::fetch::FetchResult;
use crate::urls;

// Re-export public API
pub use strip::strip_non_archivable;

/// Media type used when a response did not declare one.
const FALLBACK_MIME: &str = "application/octet-stream";

/// Encodes bytes as a base64 `data:` URI.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Fetch results of a run, keyed by requested URL, plus rendered stylesheets.
#[derive(Debug, Default)]
pub struct Resources {
    results: HashMap<String, Arc<FetchResult>>,
    stylesheets: HashMap<String, String>,
}

impl Resources {
    pub fn new<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Arc<FetchResult>>,
    {
        Resources {
            results: results
                .into_iter()
                .map(|result| (result.requested_url.clone(), result))
                .collect(),
            stylesheets: HashMap::new(),
        }
    }

    pub fn get(&self, url: &str) -> Option<&Arc<FetchResult>> {
        self.results.get(url)
    }

    /// The result for `url` if it was captured successfully.
    pub fn captured(&self, url: &str) -> Option<&FetchResult> {
        self.results
            .get(url)
            .map(Arc::as_ref)
            .filter(|result| result.is_success())
    }

    /// Rewritten CSS of a captured stylesheet.
    pub fn stylesheet(&self, url: &str) -> Option<&str> {
        self.stylesheets.get(url).map(String::as_str)
    }

    /// What a reference to `url` used as `kind` should be replaced with.
    pub fn replacement(&self, url: &str, kind: ReferenceKind) -> String {
        if kind == ReferenceKind::Link {
            return url.to_string();
        }
        if kind == ReferenceKind::Stylesheet {
            if let Some(css) = self.stylesheet(url) {
                return data_uri("text/css", css.as_bytes());
            }
        }
        match self.captured(url) {
            Some(result) => {
                let mime = result
                    .mime_type()
                    .unwrap_or_else(|| FALLBACK_MIME.to_string());
                data_uri(&mime, result.body.as_deref().unwrap_or_default())
            }
            None => url.to_string(),
        }
    }
}

/// Applies `resources` to every reference in `doc`.
///
/// `references` must come from discovery on this same document; `base` is
/// the URL they were resolved against.
pub fn rewrite_document(
    doc: &mut Document,
    base: &Url,
    references: &[ResourceReference],
    resources: &Resources,
    stats: &ProcessingStats,
) {
    // Srcset and style text are rebuilt whole, once per element
    let mut rebuilt: HashSet<(NodeId, ReferenceLocation)> = HashSet::new();

    for reference in references {
        let Some(node) = reference.node else {
            continue;
        };
        match &reference.location {
            ReferenceLocation::Attribute(name) => {
                let replacement = resources.replacement(&reference.resolved_url, reference.kind);
                if replacement.starts_with("data:") {
                    stats.increment_info(InfoType::ResourceEmbedded);
                    if reference.kind == ReferenceKind::Stylesheet {
                        doc.remove_attribute(node, "integrity");
                        doc.remove_attribute(node, "crossorigin");
                    }
                }
                doc.set_attribute(node, name, &replacement);
            }
            ReferenceLocation::Srcset(name) => {
                if !rebuilt.insert((node, reference.location.clone())) {
                    continue;
                }
                let Some(value) = doc.get_attribute(node, name) else {
                    continue;
                };
                let rewritten = rewrite_srcset(value, base, resources, stats);
                doc.set_attribute(node, name, &rewritten);
            }
            ReferenceLocation::StyleAttribute => {
                if !rebuilt.insert((node, reference.location.clone())) {
                    continue;
                }
                let Some(style) = doc.get_attribute(node, "style") else {
                    continue;
                };
                let rewritten = rewrite_css_text(style, base, resources, stats);
                doc.set_attribute(node, "style", &rewritten);
            }
            ReferenceLocation::StyleElement => {
                if !rebuilt.insert((node, reference.location.clone())) {
                    continue;
                }
                let text = doc.text_content(node);
                let rewritten = rewrite_css_text(&text, base, resources, stats);
                doc.set_text_content(node, &rewritten);
            }
            ReferenceLocation::CssUrl | ReferenceLocation::CssImport => {}
        }
    }

    declare_utf8(doc);
}

/// Relabels `<meta>` charset declarations as UTF-8, the encoding the
/// rewritten document is serialized in.
fn declare_utf8(doc: &mut Document) {
    let root = doc.root();
    for meta in doc.get_elements_by_tag_name(root, "meta") {
        if doc.has_attribute(meta, "charset") {
            doc.set_attribute(meta, "charset", "utf-8");
        } else if doc
            .get_attribute(meta, "http-equiv")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("content-type"))
        {
            doc.set_attribute(meta, "content", "text/html; charset=utf-8");
        }
    }
}

fn rewrite_srcset(
    value: &str,
    base: &Url,
    resources: &Resources,
    stats: &ProcessingStats,
) -> String {
    let candidates: Vec<_> = parse_srcset(value)
        .into_iter()
        .map(|mut candidate| {
            if let Some(resolved) = urls::resolve_fetchable(&candidate.url, Some(base)) {
                let replacement = resources.replacement(&resolved, ReferenceKind::Asset);
                if replacement.starts_with("data:") {
                    stats.increment_info(InfoType::ResourceEmbedded);
                }
                candidate.url = replacement;
            }
            candidate
        })
        .collect();
    format_srcset(&candidates)
}

/// Rewrites `url(...)` and `@import` tokens of inline CSS.
fn rewrite_css_text(
    css: &str,
    base: &Url,
    resources: &Resources,
    stats: &ProcessingStats,
) -> String {
    rewrite_stylesheet(css, base, |reference| {
        let kind = match reference.kind {
            CssReferenceKind::Import => ReferenceKind::Stylesheet,
            CssReferenceKind::Url => ReferenceKind::Asset,
        };
        let replacement = resources.replacement(&reference.resolved_url, kind);
        if replacement.starts_with("data:") {
            stats.increment_info(InfoType::ResourceEmbedded);
        }
        Some(replacement)
    })
}
