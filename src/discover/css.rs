//! Stylesheet reference scanning.
//!
//! Finds `url(...)` tokens and `@import` directives in CSS text. Matches
//! inside comments are ignored. Each reference carries the byte span of the
//! token that names the URL, so the rewriter can splice in replacements
//! without re-parsing.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error_handling::{ProcessingStats, WarningType};
use crate::urls;

/// Helper function to safely compile a regex pattern, panicking with a detailed error message
/// if compilation fails. Used for static regex patterns that are compile-time constants.
fn compile_regex_unsafe(pattern: &str, context: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| {
        panic!(
            "Failed to compile regex pattern '{}' in {}: {}. This is a programming error.",
            pattern, context, e
        )
    })
}

// Alternatives are tried left to right at each position: comments swallow
// anything inside them, `broken` only matches a `url(` the others rejected.
static CSS_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex_unsafe(
        r#"(?is)(?P<comment>/\*.*?(?:\*/|\z))|@import\s+(?P<import>url\(\s*(?:"[^"]*"|'[^']*'|[^)'"\s]*)\s*\)|"[^"]*"|'[^']*')|(?P<url>url\(\s*(?:"[^"]*"|'[^']*'|[^)'"\s]*)\s*\))|(?P<broken>url\()"#,
        "CSS_TOKEN_PATTERN",
    )
});

/// How a stylesheet names a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssReferenceKind {
    /// `url(...)` anywhere outside an `@import`.
    Url,
    /// `@import "..."` or `@import url(...)`.
    Import,
}

/// A fetchable URL found in CSS text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssReference {
    /// Byte range of the token to replace: the whole `url(...)`, or the
    /// quoted string of a bare `@import "..."`.
    pub span: Range<usize>,
    pub kind: CssReferenceKind,
    pub raw_url: String,
    pub resolved_url: String,
}

/// Result of scanning one stylesheet.
#[derive(Debug, Default)]
pub struct StylesheetScan {
    pub references: Vec<CssReference>,
    /// Tokens that were skipped: unterminated, empty or fragment-only.
    pub malformed: usize,
}

/// Scans CSS text for fetchable references, resolving them against `base`.
///
/// Inline schemes (`data:` and friends) are skipped silently; they are
/// already self-contained.
pub fn scan_stylesheet(css: &str, base: &Url) -> StylesheetScan {
    let mut scan = StylesheetScan::default();

    for caps in CSS_TOKEN_PATTERN.captures_iter(css) {
        if caps.name("comment").is_some() {
            continue;
        }
        if caps.name("broken").is_some() {
            scan.malformed += 1;
            continue;
        }

        let (token, kind) = match (caps.name("import"), caps.name("url")) {
            (Some(token), _) => (token, CssReferenceKind::Import),
            (None, Some(token)) => (token, CssReferenceKind::Url),
            (None, None) => continue,
        };

        let raw = unwrap_token(token.as_str());
        if raw.is_empty() || raw.starts_with('#') {
            scan.malformed += 1;
            continue;
        }
        if urls::is_inline_scheme(raw) {
            continue;
        }
        let Some(resolved_url) = urls::resolve_fetchable(raw, Some(base)) else {
            continue;
        };

        scan.references.push(CssReference {
            span: token.range(),
            kind,
            raw_url: raw.to_string(),
            resolved_url,
        });
    }

    scan
}

/// Scans CSS text and records skipped tokens in `stats`.
pub fn discover_stylesheet(css: &str, base: &Url, stats: &ProcessingStats) -> Vec<CssReference> {
    let scan = scan_stylesheet(css, base);
    for _ in 0..scan.malformed {
        stats.increment_warning(WarningType::CssParseRecovery);
    }
    if scan.malformed > 0 {
        log::debug!(
            "Skipped {} malformed CSS reference(s) in stylesheet based at {}",
            scan.malformed,
            base
        );
    }
    scan.references
}

/// Extracts the URL text of a `url(...)` token or a quoted string.
fn unwrap_token(token: &str) -> &str {
    let inner = match token.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("url(") => {
            token[4..].strip_suffix(')').unwrap_or(&token[4..])
        }
        _ => token,
    };
    let inner = inner.trim();
    strip_quotes(inner).trim()
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(unquoted) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return unquoted;
        }
    }
    value
}

/// Formats a replacement token for a reference.
///
/// Both kinds are written as `url("...")`, which is also valid after
/// `@import`. Quotes and line breaks in the target are percent-encoded.
pub fn css_url_token(target: &str) -> String {
    let escaped = target
        .replace('"', "%22")
        .replace('\n', "%0A")
        .replace('\r', "%0D");
    format!("url(\"{escaped}\")")
}

/// Replaces every reference span with `replacement(reference)`.
///
/// References for which `replacement` returns `None` are left as written.
pub fn rewrite_stylesheet<F>(css: &str, base: &Url, mut replacement: F) -> String
where
    F: FnMut(&CssReference) -> Option<String>,
{
    let scan = scan_stylesheet(css, base);
    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for reference in &scan.references {
        if let Some(target) = replacement(reference) {
            out.push_str(&css[cursor..reference.span.start]);
            out.push_str(&css_url_token(&target));
            cursor = reference.span.end;
        }
    }
    out.push_str(&css[cursor..]);
    out
}
