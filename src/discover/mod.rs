//! Resource discovery.
//!
//! This module finds every URL a page depends on:
//! - URL-carrying attributes of HTML elements (`src`, `href`, `poster`, ...)
//! - `srcset` candidates
//! - `url(...)` tokens in `style` attributes and `<style>` elements
//! - `url(...)` and `@import` in fetched stylesheets
//!
//! Discovery never fetches and never mutates the document.

mod css;
mod html;
mod srcset;

use crate::dom::NodeId;
use crate::urls;

// Re-export public API
pub use css::{
    css_url_token, discover_stylesheet, rewrite_stylesheet, scan_stylesheet, CssReference,
    CssReferenceKind, StylesheetScan,
};
pub use html::{discover_document, document_base};
pub use srcset::{format_srcset, parse_srcset, SrcsetCandidate};

/// Where in the document a reference was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceLocation {
    /// A single-URL attribute, by name.
    Attribute(String),
    /// One candidate of a `srcset`-style attribute, by name.
    Srcset(String),
    /// A `url(...)` inside a `style` attribute.
    StyleAttribute,
    /// A `url(...)` or `@import` inside a `<style>` element.
    StyleElement,
    /// A `url(...)` inside a fetched stylesheet.
    CssUrl,
    /// An `@import` inside a fetched stylesheet.
    CssImport,
}

/// What the referenced resource is used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Images, media, fonts, icons: embedded as-is.
    Asset,
    /// CSS: fetched, scanned for nested references, embedded after rewriting.
    Stylesheet,
    /// `iframe`/`frame` documents: embedded as-is.
    Frame,
    Script,
    /// Navigation targets: made absolute, never fetched.
    Link,
}

/// One occurrence of a URL in the page.
///
/// Several references may share a `resolved_url`; the resource is fetched
/// and archived once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    /// Element carrying the reference; `None` inside fetched stylesheets.
    pub node: Option<NodeId>,
    pub location: ReferenceLocation,
    pub kind: ReferenceKind,
    pub raw_url: String,
    pub resolved_url: String,
}

impl ResourceReference {
    /// Whether the resource should be downloaded and archived.
    pub fn is_fetchable(&self) -> bool {
        self.kind != ReferenceKind::Link && urls::is_fetchable(&self.resolved_url)
    }
}

/// Distinct fetchable URLs of `references`, in order of first appearance.
pub fn fetch_order(references: &[ResourceReference]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    references
        .iter()
        .filter(|reference| reference.is_fetchable())
        .filter(|reference| seen.insert(reference.resolved_url.as_str()))
        .map(|reference| reference.resolved_url.clone())
        .collect()
}
