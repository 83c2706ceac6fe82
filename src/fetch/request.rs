//! Single HTTP attempt: request headers, response capture and body size cap.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{HeaderName, HeaderValue};

use crate::config::{ArchivalRequest, ACCEPT_HEADER, MAX_HEADER_COUNT};
use crate::error_handling::{categorize_reqwest_error, ResourceFetchError};

/// Response of one successful exchange (any status).
#[derive(Debug)]
pub(crate) struct AttemptResponse {
    pub final_url: String,
    pub status: u16,
    pub http_version: String,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Why an attempt did not produce a 2xx response.
///
/// Error statuses keep their response so the last one can be archived.
#[derive(Debug)]
pub(crate) struct AttemptFailure {
    pub error: ResourceFetchError,
    pub response: Option<AttemptResponse>,
}

impl From<ResourceFetchError> for AttemptFailure {
    fn from(error: ResourceFetchError) -> Self {
        AttemptFailure {
            error,
            response: None,
        }
    }
}

/// Builds the ordered header list sent with every request of a run.
///
/// Starts from `User-Agent` and `Accept`, applies extra headers (sorted by
/// name, replacing a default of the same name) and ends with `Cookie`.
/// Headers that are not valid HTTP are dropped with a warning.
pub(crate) fn build_request_headers(request: &ArchivalRequest) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = vec![
        (
            "User-Agent".to_string(),
            request.effective_user_agent().to_string(),
        ),
        ("Accept".to_string(), ACCEPT_HEADER.to_string()),
    ];

    let mut extras: Vec<(&String, &String)> = request.extra_headers.iter().collect();
    extras.sort();
    for (name, value) in extras {
        if HeaderName::from_bytes(name.as_bytes()).is_err()
            || HeaderValue::from_str(value).is_err()
        {
            log::warn!("Ignoring invalid extra header {name:?}");
            continue;
        }
        match headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.clone(),
            None => headers.push((name.clone(), value.clone())),
        }
    }

    if let Some(cookie) = request.cookie_header() {
        if HeaderValue::from_str(&cookie).is_ok() {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("cookie"));
            headers.push(("Cookie".to_string(), cookie));
        } else {
            log::warn!("Ignoring cookies that do not form a valid Cookie header");
        }
    }

    headers
}

/// Sends one GET and reads the body up to `max_size` bytes.
pub(crate) async fn send_attempt(
    client: &reqwest::Client,
    url: &str,
    headers: &[(String, String)],
    max_size: usize,
) -> Result<AttemptResponse, AttemptFailure> {
    let mut builder = client.get(url);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder
        .send()
        .await
        .map_err(|e| AttemptFailure::from(categorize_reqwest_error(&e)))?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let http_version = format!("{:?}", response.version());

    let header_count = response.headers().len();
    if header_count > MAX_HEADER_COUNT {
        log::warn!(
            "Response from {} has {} headers (limit: {}), ignoring excess headers",
            final_url,
            header_count,
            MAX_HEADER_COUNT
        );
    }
    let response_headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .take(MAX_HEADER_COUNT)
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    if let Some(length) = response.content_length() {
        if length > max_size as u64 {
            return Err(ResourceFetchError::TooLarge { limit: max_size }.into());
        }
    }

    let body = read_body_capped(response, max_size).await?;

    let captured = AttemptResponse {
        final_url,
        status,
        http_version,
        headers: response_headers,
        content_type,
        body,
    };

    if (200..300).contains(&status) {
        Ok(captured)
    } else {
        Err(AttemptFailure {
            error: ResourceFetchError::Status(status),
            response: Some(captured),
        })
    }
}

/// Streams the body, failing once it grows past `max_size`.
async fn read_body_capped(
    response: reqwest::Response,
    max_size: usize,
) -> Result<Bytes, ResourceFetchError> {
    let mut stream = response.bytes_stream();
    let mut body = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| categorize_reqwest_error(&e))?;
        if body.len() + chunk.len() > max_size {
            return Err(ResourceFetchError::TooLarge { limit: max_size });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}
