//! Fetch result type.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use encoding_rs::{Encoding, UTF_8};

use crate::error_handling::ResourceFetchError;

/// Outcome of fetching one URL.
///
/// A result exists for every requested URL, successful or not, so every
/// resource can be archived. Results are immutable once cached.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL as requested (already normalized).
    pub requested_url: String,
    /// URL after following redirects; equals `requested_url` without a response.
    pub final_url: String,
    /// Status of the last response received, if any.
    pub status: Option<u16>,
    /// Protocol of the last response (`HTTP/1.1`, `HTTP/2.0`).
    pub http_version: Option<String>,
    /// Response headers in received order.
    pub headers: Vec<(String, String)>,
    /// Headers sent with the request, in sent order.
    pub request_headers: Vec<(String, String)>,
    /// Decoded response body, also kept for error statuses.
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<ResourceFetchError>,
}

impl FetchResult {
    /// A result for a fetch that produced no response at all.
    pub fn failed(
        url: &str,
        error: ResourceFetchError,
        request_headers: Vec<(String, String)>,
    ) -> Self {
        FetchResult {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status: None,
            http_version: None,
            headers: Vec::new(),
            request_headers,
            body: None,
            content_type: None,
            fetched_at: Utc::now(),
            error: Some(error),
        }
    }

    /// Whether the resource was captured: a 2xx response with a body.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && self.status.is_some_and(|status| (200..300).contains(&status))
            && self.body.is_some()
    }

    /// Media type without parameters, lower-cased (`text/css`).
    pub fn mime_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .map(|essence| essence.trim().to_ascii_lowercase())
            .filter(|essence| !essence.is_empty())
    }

    /// The `charset` parameter of the Content-Type, unquoted.
    pub fn charset(&self) -> Option<&str> {
        self.content_type
            .as_deref()?
            .split(';')
            .skip(1)
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, value)| value.trim().trim_matches(['"', '\'']))
            .filter(|value| !value.is_empty())
    }

    /// Body decoded to text.
    ///
    /// A byte order mark wins, then the declared charset; unknown labels
    /// and undeclared bodies fall back to UTF-8. Malformed sequences become
    /// U+FFFD.
    pub fn body_text(&self) -> Option<String> {
        let encoding = self
            .charset()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        self.body.as_ref().map(|body| {
            let (text, used, had_errors) = encoding.decode(body);
            if had_errors {
                log::debug!(
                    "Replaced malformed {} sequences in {}",
                    used.name(),
                    self.final_url
                );
            }
            text.into_owned()
        })
    }
}
