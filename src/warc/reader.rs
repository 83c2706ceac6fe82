//! Record-level WARC reader.
//!
//! Splits an archive into records using only the framing (version line,
//! fields, `Content-Length`, CRLF CRLF). Blocks are not interpreted.

use std::io::Read;

use flate2::read::MultiGzDecoder;

use crate::config::WARC_VERSION;
use crate::error_handling::WarcParseError;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// A record as read back from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub headers: Vec<(String, String)>,
    pub block: Vec<u8>,
}

impl ParsedRecord {
    /// Value of the first field named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn record_type(&self) -> Option<&str> {
        self.header("WARC-Type")
    }

    pub fn target_uri(&self) -> Option<&str> {
        self.header("WARC-Target-URI")
    }

    /// Status code of an `application/http` response block.
    pub fn http_status(&self) -> Option<u16> {
        let line_end = self.block.iter().position(|&b| b == b'\r')?;
        let status_line = std::str::from_utf8(&self.block[..line_end]).ok()?;
        status_line.split(' ').nth(1)?.parse().ok()
    }

    /// Body of an `application/http` block, after its header section.
    pub fn http_body(&self) -> Option<&[u8]> {
        find(&self.block, b"\r\n\r\n", 0).map(|end| &self.block[end + 4..])
    }
}

/// Splits an uncompressed archive into its records.
pub fn parse_records(data: &[u8]) -> Result<Vec<ParsedRecord>, WarcParseError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let start = offset;
        let Some(head_end) = find(data, b"\r\n\r\n", offset) else {
            return Err(WarcParseError::MissingVersion { offset: start });
        };
        let head = String::from_utf8_lossy(&data[offset..head_end]);
        let mut lines = head.split("\r\n");
        if lines.next() != Some(WARC_VERSION) {
            return Err(WarcParseError::MissingVersion { offset: start });
        }

        let mut headers = Vec::new();
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                return Err(WarcParseError::MalformedHeader {
                    offset: start,
                    line: line.to_string(),
                });
            };
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let length: usize = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
            .and_then(|(_, value)| value.parse().ok())
            .ok_or(WarcParseError::MissingContentLength { offset: start })?;

        let block_start = head_end + 4;
        let block_end = block_start
            .checked_add(length)
            .filter(|&end| end <= data.len())
            .ok_or(WarcParseError::Truncated { offset: start })?;
        if data.get(block_end..block_end + 4) != Some(b"\r\n\r\n".as_slice()) {
            return Err(WarcParseError::MissingTerminator { offset: start });
        }

        records.push(ParsedRecord {
            headers,
            block: data[block_start..block_end].to_vec(),
        });
        offset = block_end + 4;
    }

    Ok(records)
}

/// Like [`parse_records`], decompressing `.warc.gz` input first.
pub fn read_archive(data: &[u8]) -> Result<Vec<ParsedRecord>, WarcParseError> {
    if !data.starts_with(GZIP_MAGIC) {
        return parse_records(data);
    }
    let mut plain = Vec::new();
    MultiGzDecoder::new(data)
        .read_to_end(&mut plain)
        .map_err(|e| WarcParseError::Gzip(e.to_string()))?;
    parse_records(&plain)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|position| position + from)
}
