//! Round record persistence.
//!
//! Records are handed to a [`RecordSink`]. The production sink,
//! [`JsonFileStore`], keeps the whole history as a pretty-printed JSON array
//! and rewrites it on every append. The rewrite goes through a temporary
//! file in the same directory followed by a rename, so a crash mid-write
//! leaves the previous file intact.
//!
//! # Example
//!
//! ```ignore
//! use round_tracker::store::{JsonFileStore, RecordSink};
//!
//! let mut store = JsonFileStore::new("results.json");
//! store.append(&record)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::round::RoundRecord;

// ============================================================================
// RecordSink
// ============================================================================

/// Destination for finalized round records.
pub trait RecordSink: Send {
    /// Persists one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be stored. Callers log and
    /// continue; a failed append never stops the feed.
    fn append(&mut self, record: &RoundRecord) -> Result<()>;
}

impl RecordSink for Vec<RoundRecord> {
    fn append(&mut self, record: &RoundRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

// ============================================================================
// JsonFileStore
// ============================================================================

/// JSON array file holding every record of a session.
///
/// Each append reads the current file, adds the record and rewrites the
/// whole array. An unreadable or corrupt file is logged and treated as
/// empty, so it is replaced on the next append.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store writing to `path`. Nothing is touched on disk yet.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the results file.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the records currently stored.
    ///
    /// A missing or blank file yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed content and [`Error::Io`] for
    /// read failures.
    pub fn load(&self) -> Result<Vec<RoundRecord>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`load`](Self::load), but an unusable file counts as empty.
    fn load_or_empty(&self) -> Vec<RoundRecord> {
        self.load().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Existing results unreadable, starting empty");
            Vec::new()
        })
    }

    /// Replaces the file contents with `records`.
    fn rewrite(&self, records: &[RoundRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, records)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl RecordSink for JsonFileStore {
    fn append(&mut self, record: &RoundRecord) -> Result<()> {
        let mut records = self.load_or_empty();
        records.push(record.clone());
        self.rewrite(&records)?;
        debug!(round = record.round_number, total = records.len(), "Record persisted");
        Ok(())
    }
}

// ============================================================================
// File Naming
// ============================================================================

/// Default results file name for a session started at `started_at`.
///
/// Formatted as `goldenflower_results_YYYYMMDD_HHMMSS.json`.
#[must_use]
pub fn default_results_path(started_at: OffsetDateTime) -> PathBuf {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = started_at
        .format(&format)
        .unwrap_or_else(|_| started_at.unix_timestamp().to_string());
    PathBuf::from(format!("goldenflower_results_{stamp}.json"))
}

// ============================================================================
// Tests
// ============================================================================
