//! # Journal - Memory-Mapped Tick Log
//!
//! Durable, low-overhead capture of a tick stream. Producers append
//! fixed-layout binary records into a memory-mapped file; one file per UTC
//! day, preallocated to a fixed capacity.
//!
//! ## File Layout
//!
//! ```text
//! {base}/{YYYYMMDD}/journal.dat
//!
//! ┌──────────────────────┬──────────────────────────────┬──────────────┐
//! │ header: i32 LE       │ records ...                  │ zero fill    │
//! │ !(bytes written)     │ (no separators, no padding)  │ to capacity  │
//! └──────────────────────┴──────────────────────────────┴──────────────┘
//!  0                     4                              4 + N          capacity
//! ```
//!
//! The header stays `0` while the day is being written. It is finalized to
//! the one's complement of the record byte count when the appender rolls to
//! the next day or is closed. Because `!len` is never `0` for `len >= 0`, a
//! zero header always means "still open".
//!
//! ## Lifecycle
//!
//! ```text
//! Journal::open ─> create_appender ─> write_* ... (day changes) ─> finalize + map next day
//!                                                  close() ─> finalize + unmap
//! Journal::create_reader(date) ─> read_* / replay (finalized days only)
//! ```
//!
//! Exactly one appender per base path is assumed. Nothing here locks.
//!
//! ## Example
//!
//! ```rust,no_run
//! use journal::{Journal, Side, Tick};
//!
//! let journal = Journal::open("data/journal").unwrap();
//! let mut appender = journal.create_appender();
//! appender.append_tick(&Tick {
//!     timestamp: None,
//!     sequence: 1,
//!     trade_id: 10,
//!     product: "BTC-USD".into(),
//!     side: Side::Buy,
//!     size: 0.5,
//!     price: 8200.0,
//! }).unwrap();
//! appender.close().unwrap();
//! ```

mod appender;
mod reader;
mod schema;

pub use appender::JournalAppender;
pub use reader::JournalReader;
pub use schema::{Side, Tick, TickSchema};

use chrono::NaiveDate;
use clock::Clock;
use codec::CodecError;
use memmap2::{Mmap, MmapMut};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Default day-file capacity (64 MiB).
pub const DEFAULT_MAX_JOURNAL_SIZE: usize = 64 * 1024 * 1024;

/// Size of the length header at the start of every day file.
pub const HEADER_LEN: usize = 4;

/// Name of the day file inside its date directory.
pub const JOURNAL_FILENAME: &str = "journal.dat";

const ZERO_CHUNK_LEN: usize = 1024 * 1024;

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A primitive read/write crossed the mapped extent, or a value could
    /// not be encoded/decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The current day file cannot hold the next write.
    #[error("journal full: {requested} bytes at position {position} would reach capacity {capacity}")]
    NoSpace {
        position: usize,
        requested: usize,
        capacity: usize,
    },

    /// No day file exists for the requested date.
    #[error("no journal for {date} at {}", path.display())]
    NotFound { date: NaiveDate, path: PathBuf },

    /// The day file has not been finalized, so its length is unknown.
    #[error("journal for {0} is not finalized")]
    Unfinalized(NaiveDate),

    /// Capacity outside `(HEADER_LEN, i32::MAX]`.
    #[error("invalid journal capacity: {0} bytes")]
    InvalidCapacity(usize),

    /// Recovery after a crash treats an empty product as the end of the
    /// day's records, so such ticks are never written.
    #[error("tick {sequence} has an empty product")]
    EmptyProduct { sequence: i64 },

    /// The header does not describe a length that fits in the file.
    #[error("corrupt journal header {header} in {}", path.display())]
    CorruptHeader { path: PathBuf, header: i32 },
}

pub type Result<T> = std::result::Result<T, JournalError>;

/// Tunables fixed at [`Journal`] construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalOptions {
    /// Size of every day file in bytes, header included.
    pub capacity: usize,
    /// Record layout used by [`JournalAppender::append_tick`] and
    /// [`JournalReader::read_tick`].
    pub schema: TickSchema,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MAX_JOURNAL_SIZE,
            schema: TickSchema::default(),
        }
    }
}

/// A directory of day files.
///
/// Cheap to clone; clones refer to the same base path and clock.
#[derive(Debug, Clone)]
pub struct Journal {
    base_path: PathBuf,
    options: JournalOptions,
    clock: Arc<dyn Clock>,
}

impl Journal {
    /// Opens a journal with default options and the system clock.
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        Self::with_options(base_path, JournalOptions::default(), clock::system())
    }

    /// Opens a journal rooted at `base_path`, creating the directory if
    /// needed. No day file is allocated until the first write.
    pub fn with_options<P: AsRef<Path>>(
        base_path: P,
        options: JournalOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if options.capacity <= HEADER_LEN || options.capacity > i32::MAX as usize {
            return Err(JournalError::InvalidCapacity(options.capacity));
        }
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            options,
            clock,
        })
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.options.capacity
    }

    #[must_use]
    pub fn schema(&self) -> TickSchema {
        self.options.schema
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns a cursor that appends to today's file, creating it lazily.
    pub fn create_appender(&self) -> JournalAppender {
        JournalAppender::new(self.clone())
    }

    /// Maps the file for `date` read-only, positioned just past the header.
    ///
    /// # Errors
    ///
    /// [`JournalError::NotFound`] if no file exists for that date.
    pub fn create_reader(&self, date: NaiveDate) -> Result<JournalReader> {
        let path = self.day_path(date);
        if !path.is_file() {
            return Err(JournalError::NotFound { date, path });
        }
        let file = File::open(&path)?;
        if file.metadata()?.len() < HEADER_LEN as u64 {
            return Err(JournalError::CorruptHeader { path, header: 0 });
        }
        // SAFETY: day files are only mutated by the single appender; readers
        // are expected to target finalized days.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(JournalReader::new(date, path, mmap, self.options.schema))
    }

    /// Path of the day file for `date`.
    #[must_use]
    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.base_path
            .join(date.format("%Y%m%d").to_string())
            .join(JOURNAL_FILENAME)
    }

    /// Dates that have a day file, ascending.
    pub fn days(&self) -> Result<Vec<NaiveDate>> {
        let mut days: Vec<NaiveDate> = fs::read_dir(&self.base_path)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name();
                let date = NaiveDate::parse_from_str(name.to_str()?, "%Y%m%d").ok()?;
                e.path().join(JOURNAL_FILENAME).is_file().then_some(date)
            })
            .collect();
        days.sort();
        Ok(days)
    }

    /// Maps the day file for writing, creating and zero-filling it first if
    /// it does not exist. Returns the mapping and whether it was created.
    pub(crate) fn map_for_append(&self, date: NaiveDate) -> Result<(MmapMut, bool)> {
        let path = self.day_path(date);
        let created = !path.exists();
        let file = if created {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)?;
            zero_fill(&mut file, self.options.capacity as u64)?;
            file.sync_all()?;
            tracing::info!(
                %date,
                path = %path.display(),
                capacity = self.options.capacity,
                "created journal day file"
            );
            file
        } else {
            let file = OpenOptions::new().read(true).write(true).open(&path)?;
            if file.metadata()?.len() <= HEADER_LEN as u64 {
                return Err(JournalError::CorruptHeader { path, header: 0 });
            }
            file
        };
        // SAFETY: single-appender model; no other process resizes the file.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok((mmap, created))
    }
}

/// Writes `total_len` zero bytes from the start of `file`.
fn zero_fill(file: &mut File, total_len: u64) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    let zero_block = vec![0u8; ZERO_CHUNK_LEN];
    let mut remaining = total_len;
    while remaining > 0 {
        let write_len = remaining.min(ZERO_CHUNK_LEN as u64) as usize;
        file.write_all(&zero_block[..write_len])?;
        remaining -= write_len as u64;
    }
    file.flush()
}

#[cfg(test)]
mod tests;
