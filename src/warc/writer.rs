//! Archive output.

use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use super::WarcRecord;
use crate::error_handling::ArchiveError;

/// Serializes records, optionally as one gzip member per record.
#[derive(Debug, Clone, Copy)]
pub struct WarcWriter {
    compress: bool,
}

impl WarcWriter {
    pub fn new(compress: bool) -> Self {
        WarcWriter { compress }
    }

    pub fn is_compressed(&self) -> bool {
        self.compress
    }

    /// Writes a single record to `out`.
    pub fn write_record<W: Write>(&self, out: &mut W, record: &WarcRecord) -> io::Result<()> {
        let bytes = record.to_bytes();
        if !self.compress {
            return out.write_all(&bytes);
        }
        let mut encoder = GzEncoder::new(out, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;
        Ok(())
    }

    /// Writes every record to `out`, in order.
    pub fn write_to<W: Write>(&self, mut out: W, records: &[WarcRecord]) -> io::Result<()> {
        for record in records {
            self.write_record(&mut out, record)?;
        }
        out.flush()
    }

    /// Writes the archive to `path` atomically.
    ///
    /// Records go to a temporary file next to `path`, which is renamed into
    /// place only after everything was written. On error nothing appears at
    /// `path`.
    pub fn persist(&self, path: &Path, records: &[WarcRecord]) -> Result<(), ArchiveError> {
        let write_error = |source: io::Error| ArchiveError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir).map_err(write_error)?;
        {
            let mut out = BufWriter::new(temp.as_file());
            self.write_to(&mut out, records).map_err(write_error)?;
        }
        temp.as_file().sync_all().map_err(write_error)?;
        temp.persist(path).map_err(|e| write_error(e.error))?;

        log::debug!("Wrote {} WARC record(s) to {}", records.len(), path.display());
        Ok(())
    }
}
