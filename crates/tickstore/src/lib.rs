//! # Tickstore - Bitemporal Splay Store
//!
//! Stores one [`Batch`] per `(symbol, date, version)` and answers
//! "what did the data for these days look like as of instant `t`".
//!
//! ```text
//! insert(BTC-USD, 2019-10-01, batch)
//!   ├─ index.next_version()        -> 0
//!   ├─ splay::write_batch(...)     -> {base}/2019/10/01/BTC-USD_0000.tick
//!   ├─ index.insert(...)           -> closes previous version at "now"
//!   └─ index.flush()
//!
//! select(BTC-USD, start, end, as_of)
//!   ├─ index.select(dates of [start, end], as_of)
//!   ├─ read + concat every matching splay file
//!   └─ filter to [start, end] on the timestamp column, sort ascending
//! ```
//!
//! [`LocalTickstore`] keeps both the index and the splay tree under one base
//! directory. [`RemoteBlobTickstore`] exists so callers can be written
//! against the [`Tickstore`] trait, but has no backend.

pub mod ingest;
mod local;
mod remote;

pub use local::{splay_path, validate_symbol, LocalTickstore, LocalTickstoreOptions};
pub use remote::RemoteBlobTickstore;
pub use splay::{Batch, ColumnData, DataType};

use chrono::{DateTime, NaiveDate, Utc};
use clock::LATEST;
use index::IndexError;
use journal::JournalError;
use splay::SplayError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during tickstore operations.
#[derive(Debug, Error)]
pub enum TickstoreError {
    /// The store was closed or destroyed.
    #[error("tickstore is closed")]
    Closed,

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("splay error: {0}")]
    Splay(#[from] SplayError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Input data does not have the shape the operation needs.
    #[error("schema error: {0}")]
    Schema(String),

    /// Symbols become path components.
    #[error("invalid symbol {0:?}")]
    InvalidSymbol(String),

    /// The backend does not implement this capability.
    #[error("{backend} does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, TickstoreError>;

/// The two time axes of a stored version.
///
/// `as_at` is the calendar date the data describes. `as_of` is the instant
/// at which to look at the store; [`LATEST`] means "whatever is current".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BiTimestamp {
    pub as_at: NaiveDate,
    pub as_of: DateTime<Utc>,
}

impl BiTimestamp {
    pub fn new(as_at: NaiveDate) -> Self {
        Self {
            as_at,
            as_of: LATEST,
        }
    }

    pub fn with_as_of(self, as_of: DateTime<Utc>) -> Self {
        Self { as_of, ..self }
    }

    pub fn is_latest(&self) -> bool {
        self.as_of == LATEST
    }
}

/// Capabilities shared by every tickstore backend.
///
/// Lifecycle is `open -> closed`. Once closed, every operation except
/// [`close`](Tickstore::close), [`destroy`](Tickstore::destroy) and
/// [`is_open`](Tickstore::is_open) fails with [`TickstoreError::Closed`].
pub trait Tickstore {
    /// Ticks for `symbol` with a timestamp in `[start, end]` as the store
    /// looked at `as_of`, sorted ascending by timestamp.
    fn select(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Result<Batch>;

    /// Stores `batch` as the new current version of `(symbol, ts.as_at)`
    /// and returns the file it was written to.
    fn insert(&mut self, symbol: &str, ts: BiTimestamp, batch: &Batch) -> Result<PathBuf>;

    /// Logically deletes `(symbol, ts.as_at)`. Returns `false` if there was
    /// no current version.
    fn delete(&mut self, symbol: &str, ts: BiTimestamp) -> Result<bool>;

    fn flush(&mut self) -> Result<()>;

    /// Persists state and closes the store. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Removes everything the store has written and closes it.
    fn destroy(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests;
