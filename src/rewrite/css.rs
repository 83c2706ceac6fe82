//! Bottom-up rendering of captured stylesheets.
//!
//! A stylesheet is rendered after the stylesheets it imports, so each
//! `@import` can embed the finished text of its target. Rendered sheets are
//! memoized; an import back into the chain being rendered keeps its absolute
//! URL.

use std::collections::HashMap;

use url::Url;

use super::{data_uri, Resources};
use crate::discover::{rewrite_stylesheet, CssReferenceKind, ReferenceKind};
use crate::error_handling::{ProcessingStats, WarningType};

impl Resources {
    /// Renders every captured stylesheet among `urls`.
    ///
    /// Afterwards [`Resources::replacement`] embeds the rendered text for
    /// references of kind `Stylesheet`. Uncaptured URLs are skipped.
    pub fn render_stylesheets(&mut self, urls: &[String], stats: &ProcessingStats) {
        let mut rendered = HashMap::new();
        for url in urls {
            let mut chain = Vec::new();
            render(self, url, &mut chain, &mut rendered, stats);
        }
        self.stylesheets.extend(rendered);
    }
}

fn render(
    resources: &Resources,
    url: &str,
    chain: &mut Vec<String>,
    rendered: &mut HashMap<String, String>,
    stats: &ProcessingStats,
) -> Option<String> {
    if let Some(css) = rendered.get(url) {
        return Some(css.clone());
    }
    let result = resources.captured(url)?;
    let text = result.body_text()?;
    // Nested references resolve against where the sheet actually came from
    let base = Url::parse(&result.final_url).ok()?;

    chain.push(url.to_string());
    let css = rewrite_stylesheet(&text, &base, |reference| match reference.kind {
        CssReferenceKind::Import => {
            if chain.contains(&reference.resolved_url) {
                log::debug!(
                    "Breaking @import cycle at {} (imported from {})",
                    reference.resolved_url,
                    url
                );
                stats.increment_warning(WarningType::CssImportCycle);
                return Some(reference.resolved_url.clone());
            }
            let nested = render(resources, &reference.resolved_url, chain, rendered, stats);
            Some(match nested {
                Some(nested) => data_uri("text/css", nested.as_bytes()),
                None => reference.resolved_url.clone(),
            })
        }
        CssReferenceKind::Url => Some(
            resources.replacement(&reference.resolved_url, ReferenceKind::Asset),
        ),
    });
    chain.pop();

    rendered.insert(url.to_string(), css.clone());
    Some(css)
}
