//! WARC record construction and framing.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use strum_macros::Display;
use uuid::Uuid;

use crate::config::{
    HTTP_STATUS_BAD_GATEWAY, HTTP_STATUS_GATEWAY_TIMEOUT, WARC_SOFTWARE, WARC_VERSION,
};
use crate::error_handling::ResourceFetchError;
use crate::fetch::FetchResult;

/// Header carrying the reason a resource could not be captured.
pub const FETCH_ERROR_HEADER: &str = "WARC-Fetch-Error";

/// Response headers that describe an encoding the stored body no longer has.
const DROPPED_RESPONSE_HEADERS: &[&str] = &["transfer-encoding", "content-encoding", "content-length"];

const HTTP_VERSION: &str = "HTTP/1.1";

/// The `WARC-Type` of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RecordType {
    Warcinfo,
    Request,
    Response,
    Resource,
}

/// One WARC record, ready to be framed.
///
/// `Content-Length` and `WARC-Block-Digest` are derived from `block` when the
/// record is serialized, so they can never disagree with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarcRecord {
    pub record_type: RecordType,
    /// `<urn:uuid:...>`
    pub record_id: String,
    pub date: DateTime<Utc>,
    pub target_uri: Option<String>,
    /// Additional named fields, written in order after the standard ones.
    pub headers: Vec<(String, String)>,
    pub content_type: String,
    pub block: Vec<u8>,
}

impl WarcRecord {
    pub fn new(record_type: RecordType, content_type: &str, block: Vec<u8>) -> Self {
        WarcRecord {
            record_type,
            record_id: new_record_id(),
            date: Utc::now(),
            target_uri: None,
            headers: Vec::new(),
            content_type: content_type.to_string(),
            block,
        }
    }

    pub fn with_target(mut self, uri: &str) -> Self {
        self.target_uri = Some(uri.to_string());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First additional field named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn block_digest(&self) -> String {
        sha256_digest(&self.block)
    }

    /// Serializes the record: version line, fields, blank line, block, CRLF CRLF.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = String::with_capacity(512);
        push_field(&mut head, "WARC-Type", &self.record_type.to_string());
        push_field(&mut head, "WARC-Record-ID", &self.record_id);
        push_field(
            &mut head,
            "WARC-Date",
            &self.date.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        if let Some(target) = &self.target_uri {
            push_field(&mut head, "WARC-Target-URI", target);
        }
        for (name, value) in &self.headers {
            push_field(&mut head, name, value);
        }
        push_field(&mut head, "Content-Type", &self.content_type);
        push_field(&mut head, "WARC-Block-Digest", &self.block_digest());
        push_field(&mut head, "Content-Length", &self.block.len().to_string());

        let mut out = Vec::with_capacity(head.len() + self.block.len() + 16);
        out.extend_from_slice(WARC_VERSION.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.block);
        out.extend_from_slice(b"\r\n\r\n");
        out
    }
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    // Field values are single-line
    out.extend(value.chars().map(|c| if c == '\r' || c == '\n' { ' ' } else { c }));
    out.push_str("\r\n");
}

fn new_record_id() -> String {
    format!("<urn:uuid:{}>", Uuid::new_v4())
}

/// `sha256:<hex>` digest of `bytes`.
pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// The `warcinfo` record opening every archive.
pub fn warcinfo_record(target_url: &str, degraded: bool, filename: Option<&str>) -> WarcRecord {
    let mut fields = String::new();
    push_field(&mut fields, "software", WARC_SOFTWARE);
    push_field(&mut fields, "format", "WARC File Format 1.0");
    push_field(
        &mut fields,
        "conformsTo",
        "http://iipc.github.io/warc-specifications/specifications/warc-format/warc-1.0/",
    );
    push_field(&mut fields, "target-uri", target_url);
    push_field(&mut fields, "degraded", if degraded { "true" } else { "false" });

    let record = WarcRecord::new(
        RecordType::Warcinfo,
        "application/warc-fields",
        fields.into_bytes(),
    );
    match filename {
        Some(name) => record.with_header("WARC-Filename", name),
        None => record,
    }
}

/// The HTTP request sent for `result`.
pub fn request_record(result: &FetchResult) -> WarcRecord {
    let mut block = String::new();
    let (target, host) = match url::Url::parse(&result.requested_url) {
        Ok(parsed) => {
            let mut target = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                target.push('?');
                target.push_str(query);
            }
            let host = match (parsed.host_str(), parsed.port()) {
                (Some(host), Some(port)) => format!("{host}:{port}"),
                (Some(host), None) => host.to_string(),
                (None, _) => String::new(),
            };
            (target, host)
        }
        Err(_) => (result.requested_url.clone(), String::new()),
    };
    block.push_str(&format!("GET {target} {HTTP_VERSION}\r\n"));
    push_field(&mut block, "Host", &host);
    for (name, value) in &result.request_headers {
        push_field(&mut block, name, value);
    }
    block.push_str("\r\n");

    WarcRecord::new(
        RecordType::Request,
        "application/http;msgtype=request",
        block.into_bytes(),
    )
    .with_date(result.fetched_at)
    .with_target(&result.requested_url)
}

/// The HTTP response received for `result`, concurrent to `request_id`.
///
/// Bodies are stored decoded, so transfer and content encodings are dropped
/// and `Content-Length` is recomputed. A fetch that got no response at all
/// is stored as a synthesized gateway error.
pub fn response_record(result: &FetchResult, request_id: &str) -> WarcRecord {
    let body = result.body.as_deref().unwrap_or_default();
    let status = result.status.unwrap_or(match result.error {
        Some(ResourceFetchError::Timeout) | Some(ResourceFetchError::Cancelled) => {
            HTTP_STATUS_GATEWAY_TIMEOUT
        }
        _ => HTTP_STATUS_BAD_GATEWAY,
    });
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("");
    let version = result.http_version.as_deref().unwrap_or(HTTP_VERSION);

    let mut head = format!("{version} {status} {reason}\r\n");
    for (name, value) in &result.headers {
        let lower = name.to_ascii_lowercase();
        if !DROPPED_RESPONSE_HEADERS.contains(&lower.as_str()) {
            push_field(&mut head, name, value);
        }
    }
    push_field(&mut head, "Content-Length", &body.len().to_string());
    head.push_str("\r\n");

    let mut block = head.into_bytes();
    block.extend_from_slice(body);

    let mut record = WarcRecord::new(
        RecordType::Response,
        "application/http;msgtype=response",
        block,
    )
    .with_date(result.fetched_at)
    .with_target(&result.requested_url)
    .with_header("WARC-Concurrent-To", request_id)
    .with_header("WARC-Payload-Digest", &sha256_digest(body));
    if let Some(error) = &result.error {
        record = record.with_header(FETCH_ERROR_HEADER, &error.to_string());
    }
    record
}

/// The rewritten, self-contained document, referring to the root response.
pub fn resource_record(target_url: &str, html: &str, refers_to: &str) -> WarcRecord {
    let block = html.as_bytes().to_vec();
    let payload_digest = sha256_digest(&block);
    WarcRecord::new(RecordType::Resource, "text/html; charset=utf-8", block)
        .with_target(target_url)
        .with_header("WARC-Refers-To", refers_to)
        .with_header("WARC-Payload-Digest", &payload_digest)
}
