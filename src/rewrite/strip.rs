//! Removal of elements that do not belong in a static archive.

use crate::dom::{Document, NodeId};
use crate::error_handling::{InfoType, ProcessingStats};

/// Removes scripts, script preloads and 1x1 tracking pixels from `doc`.
///
/// `noscript` content and inline event attributes are left alone. Returns
/// the number of elements removed.
pub fn strip_non_archivable(doc: &mut Document, stats: &ProcessingStats) -> usize {
    let root = doc.root();
    let candidates = doc.get_all_nodes_with_tag(root, &["script", "link", "img"]);
    let doomed: Vec<NodeId> = candidates
        .into_iter()
        .filter(|&node| match doc.tag_name(node) {
            Some("script") => true,
            Some("link") => is_script_preload(doc, node),
            Some("img") => is_tracking_pixel(doc, node),
            _ => false,
        })
        .collect();

    for _ in &doomed {
        stats.increment_info(InfoType::ElementStripped);
    }
    if !doomed.is_empty() {
        log::debug!("Stripping {} non-archivable element(s)", doomed.len());
    }
    doc.remove_nodes(&doomed, None);
    doomed.len()
}

fn is_script_preload(doc: &Document, node: NodeId) -> bool {
    let rel = doc
        .get_attribute(node, "rel")
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut tokens = rel.split_ascii_whitespace();
    if tokens.clone().any(|token| token == "modulepreload") {
        return true;
    }
    tokens.any(|token| matches!(token, "preload" | "prefetch"))
        && doc
            .get_attribute(node, "as")
            .is_some_and(|destination| destination.trim().eq_ignore_ascii_case("script"))
}

fn is_tracking_pixel(doc: &Document, node: NodeId) -> bool {
    let is_one = |name: &str| {
        doc.get_attribute(node, name)
            .map(|value| value.trim().trim_end_matches("px"))
            .is_some_and(|value| value == "1" || value == "0")
    };
    is_one("width") && is_one("height")
}
