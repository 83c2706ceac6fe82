//! WARC 1.0 archive writing.
//!
//! An archive is an ordered list of [`WarcRecord`]s:
//! - one `warcinfo` record describing the run
//! - a `request`/`response` pair per fetched URL, root page first
//! - a final `resource` record holding the rewritten page
//!
//! [`WarcWriter`] frames and optionally gzips the records; [`parse_records`]
//! reads them back.

mod reader;
mod record;
mod writer;

// Re-export public API
pub use reader::{parse_records, read_archive, ParsedRecord};
pub use record::{
    request_record, resource_record, response_record, sha256_digest, warcinfo_record,
    RecordType, WarcRecord, FETCH_ERROR_HEADER,
};
pub use writer::WarcWriter;
