//! Reference discovery in HTML documents.

use url::Url;

use super::css::{scan_stylesheet, CssReferenceKind};
use super::srcset::parse_srcset;
use super::{ReferenceKind, ReferenceLocation, ResourceReference};
use crate::dom::{Document, NodeId};
use crate::error_handling::{ProcessingStats, WarningType};
use crate::urls;

/// Elements whose single-URL attribute names a resource, with its use.
const ATTRIBUTE_RULES: &[(&[&str], &str, ReferenceKind)] = &[
    (&["img"], "src", ReferenceKind::Asset),
    (&["script"], "src", ReferenceKind::Script),
    (&["iframe", "frame"], "src", ReferenceKind::Frame),
    (
        &["audio", "video", "source", "embed", "track"],
        "src",
        ReferenceKind::Asset,
    ),
    (&["video"], "poster", ReferenceKind::Asset),
    (&["object"], "data", ReferenceKind::Asset),
    (&["body", "table", "td", "th"], "background", ReferenceKind::Asset),
    (&["a", "area"], "href", ReferenceKind::Link),
];

/// Elements carrying a `srcset` candidate list.
const SRCSET_TAGS: &[&str] = &["img", "source"];

/// The URL relative references in `doc` resolve against.
///
/// This is the first `<base href>` (itself resolved against `page_url`) when
/// it yields an http(s) URL, otherwise `page_url`.
pub fn document_base(doc: &Document, page_url: &Url) -> Url {
    doc.get_elements_by_tag_name(doc.root(), "base")
        .into_iter()
        .find_map(|base| doc.get_attribute(base, "href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or_else(|| page_url.clone())
}

/// Lists every reference in `doc`, in document order.
///
/// Within one element, references follow attribute rule order, then
/// `srcset` candidates, then `style` attribute tokens. `<style>` text is
/// scanned as CSS. Empty, fragment-only and inline-scheme URLs are skipped;
/// skipped fragments that look like mistakes are counted in `stats`.
pub fn discover_document(
    doc: &Document,
    base: &Url,
    stats: &ProcessingStats,
) -> Vec<ResourceReference> {
    let mut collector = Collector {
        base,
        stats,
        references: Vec::new(),
    };

    for node in doc.get_elements_by_tag_name(doc.root(), "*") {
        let Some(tag) = doc.tag_name(node) else {
            continue;
        };

        for (tags, attribute, kind) in ATTRIBUTE_RULES {
            if tags.contains(&tag) {
                if let Some(value) = doc.get_attribute(node, attribute) {
                    collector.attribute(node, attribute, *kind, value);
                }
            }
        }

        match tag {
            "link" => {
                if let Some(href) = doc.get_attribute(node, "href") {
                    collector.attribute(node, "href", link_kind(doc, node), href);
                }
            }
            "input" => {
                let is_image = doc
                    .get_attribute(node, "type")
                    .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("image"));
                if is_image {
                    if let Some(src) = doc.get_attribute(node, "src") {
                        collector.attribute(node, "src", ReferenceKind::Asset, src);
                    }
                }
            }
            _ => {}
        }

        if SRCSET_TAGS.contains(&tag) {
            if let Some(value) = doc.get_attribute(node, "srcset") {
                collector.srcset(node, "srcset", value);
            }
        }

        if let Some(style) = doc.get_attribute(node, "style") {
            collector.css(node, ReferenceLocation::StyleAttribute, style);
        }

        if tag == "style" {
            let text = doc.text_content(node);
            collector.css(node, ReferenceLocation::StyleElement, &text);
        }
    }

    collector.references
}

/// What a `<link href>` points at, from its `rel` and `as` attributes.
fn link_kind(doc: &Document, node: NodeId) -> ReferenceKind {
    let rel = doc
        .get_attribute(node, "rel")
        .unwrap_or_default()
        .to_ascii_lowercase();
    let tokens: Vec<&str> = rel.split_ascii_whitespace().collect();

    if tokens.contains(&"stylesheet") {
        return ReferenceKind::Stylesheet;
    }
    if tokens.iter().any(|token| {
        matches!(
            *token,
            "icon" | "apple-touch-icon" | "apple-touch-icon-precomposed" | "mask-icon"
        )
    }) {
        return ReferenceKind::Asset;
    }
    if tokens.contains(&"modulepreload") {
        return ReferenceKind::Script;
    }
    if tokens.iter().any(|token| matches!(*token, "preload" | "prefetch")) {
        let destination = doc
            .get_attribute(node, "as")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        return match destination.as_str() {
            "script" => ReferenceKind::Script,
            "style" => ReferenceKind::Stylesheet,
            "document" | "" => ReferenceKind::Link,
            _ => ReferenceKind::Asset,
        };
    }
    ReferenceKind::Link
}

struct Collector<'a> {
    base: &'a Url,
    stats: &'a ProcessingStats,
    references: Vec<ResourceReference>,
}

impl Collector<'_> {
    fn attribute(&mut self, node: NodeId, attribute: &str, kind: ReferenceKind, value: &str) {
        let raw = value.trim();
        if raw.is_empty() || raw.starts_with('#') || urls::is_inline_scheme(raw) {
            return;
        }
        match resolve_absolute(raw, self.base) {
            Some(resolved_url) => self.references.push(ResourceReference {
                node: Some(node),
                location: ReferenceLocation::Attribute(attribute.to_string()),
                kind,
                raw_url: raw.to_string(),
                resolved_url,
            }),
            None => {
                log::debug!("Leaving unresolvable {attribute} value as-is: {raw}");
                self.stats.increment_warning(WarningType::UnresolvableUrl);
            }
        }
    }

    fn srcset(&mut self, node: NodeId, attribute: &str, value: &str) {
        for candidate in parse_srcset(value) {
            let raw = candidate.url.as_str();
            if urls::is_inline_scheme(raw) {
                continue;
            }
            let resolved = if raw.starts_with('#') {
                None
            } else {
                resolve_absolute(raw, self.base)
            };
            match resolved {
                Some(resolved_url) => self.references.push(ResourceReference {
                    node: Some(node),
                    location: ReferenceLocation::Srcset(attribute.to_string()),
                    kind: ReferenceKind::Asset,
                    raw_url: raw.to_string(),
                    resolved_url,
                }),
                None => self.stats.increment_warning(WarningType::SrcsetParseRecovery),
            }
        }
    }

    fn css(&mut self, node: NodeId, location: ReferenceLocation, css: &str) {
        let scan = scan_stylesheet(css, self.base);
        for _ in 0..scan.malformed {
            self.stats.increment_warning(WarningType::CssParseRecovery);
        }
        for reference in scan.references {
            let kind = match reference.kind {
                CssReferenceKind::Import => ReferenceKind::Stylesheet,
                CssReferenceKind::Url => ReferenceKind::Asset,
            };
            self.references.push(ResourceReference {
                node: Some(node),
                location: location.clone(),
                kind,
                raw_url: reference.raw_url,
                resolved_url: reference.resolved_url,
            });
        }
    }
}

/// Resolves `raw` to an absolute URL string, or `None` if that fails.
fn resolve_absolute(raw: &str, base: &Url) -> Option<String> {
    let resolved = urls::resolve(raw, Some(base));
    Url::parse(&resolved).ok().map(|_| resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://example.com/blog/post.html").expect("valid url")
    }

    fn discover(html: &str) -> (Document, Vec<ResourceReference>, ProcessingStats) {
        let doc = Document::parse(html);
        let stats = ProcessingStats::new();
        let base = document_base(&doc, &page_url());
        let refs = discover_document(&doc, &base, &stats);
        (doc, refs, stats)
    }

    fn summary(refs: &[ResourceReference]) -> Vec<(ReferenceKind, &str)> {
        refs.iter()
            .map(|r| (r.kind, r.resolved_url.as_str()))
            .collect()
    }

    #[test]
    fn test_discover_document_order_and_kinds() {
        let (_, refs, _) = discover(
            r#"<html><head>
                <link rel="stylesheet" href="/css/site.css">
                <link rel="icon" href="/favicon.ico">
                <link rel="canonical" href="https://example.com/blog/post.html">
                <script src="app.js"></script>
            </head><body>
                <img src="img/a.png">
                <iframe src="frame.html"></iframe>
                <a href="../about">About</a>
                <video poster="poster.jpg"><source src="clip.mp4"></video>
            </body></html>"#,
        );
        assert_eq!(
            summary(&refs),
            vec![
                (ReferenceKind::Stylesheet, "https://example.com/css/site.css"),
                (ReferenceKind::Asset, "https://example.com/favicon.ico"),
                (ReferenceKind::Link, "https://example.com/blog/post.html"),
                (ReferenceKind::Script, "https://example.com/blog/app.js"),
                (ReferenceKind::Asset, "https://example.com/blog/img/a.png"),
                (ReferenceKind::Frame, "https://example.com/blog/frame.html"),
                (ReferenceKind::Link, "https://example.com/about"),
                (ReferenceKind::Asset, "https://example.com/blog/poster.jpg"),
                (ReferenceKind::Asset, "https://example.com/blog/clip.mp4"),
            ]
        );
        assert!(refs.iter().all(|r| r.node.is_some()));
    }

    #[test]
    fn test_discover_skips_inline_and_fragment_urls() {
        let (_, refs, stats) = discover(
            r##"<body>
                <img src="data:image/png;base64,AAAA">
                <a href="#top">Top</a>
                <a href="javascript:void(0)">JS</a>
                <img src="   ">
                <a href="mailto:me@example.com">Mail</a>
            </body>"##,
        );
        assert!(refs.is_empty());
        assert_eq!(stats.total_warnings(), 0);
    }

    #[test]
    fn test_discover_srcset_candidates() {
        let (_, refs, _) = discover(
            r#"<body><picture>
                <source srcset="wide.webp 1200w, narrow.webp 600w">
                <img src="fallback.jpg" srcset="fallback.jpg 1x, fallback@2x.jpg 2x">
            </picture></body>"#,
        );
        let srcset: Vec<&str> = refs
            .iter()
            .filter(|r| r.location == ReferenceLocation::Srcset("srcset".into()))
            .map(|r| r.raw_url.as_str())
            .collect();
        assert_eq!(
            srcset,
            vec!["wide.webp", "narrow.webp", "fallback.jpg", "fallback@2x.jpg"]
        );
        // src comes before srcset on the same element
        assert_eq!(refs[2].location, ReferenceLocation::Attribute("src".into()));
        assert_eq!(refs[2].raw_url, "fallback.jpg");
    }

    #[test]
    fn test_discover_style_attribute_and_element() {
        let (_, refs, _) = discover(
            r#"<html><head><style>
                @import "print.css";
                body { background: url(bg.png); }
            </style></head>
            <body><div style="background-image: url('hero.jpg')"></div></body></html>"#,
        );
        assert_eq!(
            refs.iter()
                .map(|r| (r.location.clone(), r.kind, r.raw_url.as_str()))
                .collect::<Vec<_>>(),
            vec![
                (ReferenceLocation::StyleElement, ReferenceKind::Stylesheet, "print.css"),
                (ReferenceLocation::StyleElement, ReferenceKind::Asset, "bg.png"),
                (ReferenceLocation::StyleAttribute, ReferenceKind::Asset, "hero.jpg"),
            ]
        );
    }

    #[test]
    fn test_discover_extra_attributes() {
        let (_, refs, _) = discover(
            r#"<body background="paper.gif">
                <input type="image" src="submit.png">
                <input type="text" src="ignored.png">
                <object data="movie.swf"></object>
                <embed src="plugin.bin">
                <table><tr><td background="cell.gif"></td></tr></table>
            </body>"#,
        );
        let raws: Vec<&str> = refs.iter().map(|r| r.raw_url.as_str()).collect();
        assert_eq!(
            raws,
            vec!["paper.gif", "submit.png", "movie.swf", "plugin.bin", "cell.gif"]
        );
    }

    #[test]
    fn test_link_kinds() {
        let (_, refs, _) = discover(
            r#"<head>
                <link rel="preload" as="script" href="a.js">
                <link rel="preload" as="style" href="b.css">
                <link rel="preload" as="font" href="c.woff2">
                <link rel="modulepreload" href="d.js">
                <link rel="alternate" href="feed.xml">
                <link rel="Shortcut Icon" href="e.ico">
            </head>"#,
        );
        assert_eq!(
            refs.iter().map(|r| r.kind).collect::<Vec<_>>(),
            vec![
                ReferenceKind::Script,
                ReferenceKind::Stylesheet,
                ReferenceKind::Asset,
                ReferenceKind::Script,
                ReferenceKind::Link,
                ReferenceKind::Asset,
            ]
        );
    }

    #[test]
    fn test_document_base_uses_base_href() {
        let doc = Document::parse(
            r#"<html><head><base href="https://cdn.example.net/assets/"></head>
            <body><img src="a.png"></body></html>"#,
        );
        let base = document_base(&doc, &page_url());
        assert_eq!(base.as_str(), "https://cdn.example.net/assets/");

        let stats = ProcessingStats::new();
        let refs = discover_document(&doc, &base, &stats);
        assert_eq!(refs[0].resolved_url, "https://cdn.example.net/assets/a.png");
    }

    #[test]
    fn test_document_base_ignores_non_http_base() {
        let doc = Document::parse(r#"<head><base href="javascript:alert(1)"></head>"#);
        assert_eq!(document_base(&doc, &page_url()), page_url());

        let doc = Document::parse(r#"<head><base target="_blank"></head>"#);
        assert_eq!(document_base(&doc, &page_url()), page_url());
    }

    #[test]
    fn test_discover_counts_recoveries() {
        let (_, refs, stats) = discover(
            r##"<body>
                <img src="http://[::1">
                <img srcset="#frag 1x, ok.png 2x">
                <div style="background: url()"></div>
            </body>"##,
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].raw_url, "ok.png");
        assert_eq!(stats.get_warning_count(WarningType::UnresolvableUrl), 1);
        assert_eq!(stats.get_warning_count(WarningType::SrcsetParseRecovery), 1);
        assert_eq!(stats.get_warning_count(WarningType::CssParseRecovery), 1);
    }

    #[test]
    fn test_duplicate_references_are_all_reported() {
        let (_, refs, _) = discover(
            r#"<body><img src="a.png"><img src="./a.png#x"><img src="a.png?utm_source=feed"></body>"#,
        );
        assert_eq!(refs.len(), 3);
        assert!(refs
            .iter()
            .all(|r| r.resolved_url == "https://example.com/blog/a.png"));
        assert_eq!(super::super::fetch_order(&refs).len(), 1);
    }
}
