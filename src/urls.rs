//! URL resolution and normalization.
//!
//! Every reference found in a page is turned into one canonical absolute
//! string before it is fetched or compared, so two spellings of the same
//! resource (different fragment, tracking parameters, parameter order) share
//! one cache entry and one archive record.

use url::form_urlencoded;
use url::Url;

/// Schemes that never point at a fetchable resource.
const INLINE_SCHEMES: &[&str] = &["data:", "javascript:", "about:", "blob:", "mailto:", "tel:"];

/// Resolves `raw` against `base` and normalizes the result.
///
/// - empty `raw` or no base: `""`
/// - fragment-only references (`#top`): returned unchanged
/// - absolute URLs with a host: normalized as-is
/// - anything else: joined onto `base`, then normalized
/// - unparseable input: returned unchanged
///
/// The result is stable: resolving it again yields the same string.
pub fn resolve(raw: &str, base: Option<&Url>) -> String {
    let Some(base) = base else {
        return String::new();
    };
    if raw.is_empty() {
        return String::new();
    }
    if raw.starts_with('#') {
        return raw.to_string();
    }

    if let Ok(mut absolute) = Url::parse(raw) {
        if absolute.host_str().is_some_and(|host| !host.is_empty()) {
            clean_url(&mut absolute);
            return absolute.into();
        }
    }

    match base.join(raw) {
        Ok(mut joined) => {
            clean_url(&mut joined);
            joined.into()
        }
        Err(_) => raw.to_string(),
    }
}

/// Like [`resolve`], but only yields URLs that can be fetched over HTTP.
pub fn resolve_fetchable(raw: &str, base: Option<&Url>) -> Option<String> {
    let resolved = resolve(raw, base);
    is_fetchable(&resolved).then_some(resolved)
}

/// Drops the fragment and every `utm_*` query parameter.
///
/// The remaining parameters are re-encoded sorted by name; parameters with
/// the same name keep their relative order. An empty query is removed.
pub fn clean_url(url: &mut Url) {
    url.set_fragment(None);
    if url.query().is_none() {
        return;
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
        return;
    }

    // Stable sort keeps repeated keys in their original order
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    url.set_query(Some(&encoded));
}

/// Whether `url` is an absolute http(s) URL.
pub fn is_fetchable(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Whether `raw` uses a scheme whose content is inline or not a resource.
pub fn is_inline_scheme(raw: &str) -> bool {
    let trimmed = raw.trim_start();
    INLINE_SCHEMES.iter().any(|scheme| {
        trimmed
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}
