//! page_warc library: single-page web archiving into WARC files
//!
//! This library fetches a web page and every resource it references (images,
//! stylesheets and their imports, fonts, frames, `srcset` variants, inline
//! style references), rewrites the page so every reference points at the
//! captured bytes, and stores the result together with the raw HTTP
//! exchanges in a WARC 1.0 archive.
//!
//! # Example
//!
//! ```no_run
//! use page_warc::{new_archive, ArchivalRequest};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = ArchivalRequest {
//!     url: "https://example.com/".to_string(),
//!     log_enabled: true,
//!     ..Default::default()
//! };
//!
//! let report = new_archive(&request, "example").await?;
//! println!("Archived {} of {} resources into {}",
//!          report.fetched, report.resources_discovered, report.output_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

mod archive;
pub mod config;
pub mod discover;
pub mod dom;
mod error_handling;
pub mod fetch;
pub mod initialization;
pub mod rewrite;
pub mod urls;
pub mod warc;

// Re-export public API
pub use archive::{
    capture, new_archive, new_archive_with, output_path, ArchiveReport, CapturedPage,
};
pub use config::{ArchivalRequest, Config, Cookie, LogFormat, LogLevel};
pub use error_handling::{
    ArchiveError, ErrorType, InfoType, InitializationError, ProcessingStats, ResourceFetchError,
    WarcParseError, WarningType,
};
