//! # Splay - Per-(symbol, date, version) Tick Files
//!
//! A [`Batch`] is a small columnar table (named, typed, equal-length
//! columns). Each tickstore version of a `(symbol, date)` is one batch
//! written to one file with [`write_batch`] and never touched again.
//!
//! ## File Layout
//!
//! ```text
//! [HEADER] magic(4 = "SPL1") | format_version(u8) | crc32(u32)
//! [BODY]   zstd( row_count(u64) | column_count(u32)
//!                | repeated: name(varint + utf-8) | type_tag(u8) | values[row_count] )
//! ```
//!
//! The CRC32 covers the compressed body. Values are little-endian; strings
//! use the same varint-prefixed encoding as the journal.

mod batch;
mod format;

pub use batch::{Batch, Column, ColumnData, DataType};
pub use format::{read_batch, tmp_path_for, write_batch, DEFAULT_COMPRESSION_LEVEL};

use codec::CodecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, writing or reading batches.
#[derive(Debug, Error)]
pub enum SplayError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The file could not be decoded.
    #[error("corrupt splay file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Splay files are immutable once written.
    #[error("splay file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("column {column:?} has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column {0:?}")]
    DuplicateColumn(String),

    #[error("no column named {0:?}")]
    MissingColumn(String),

    #[error("column {column:?} is {actual:?}, expected {expected:?}")]
    ColumnType {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    /// Batches being concatenated disagree on column names or types.
    #[error("schema mismatch: {expected} vs {actual}")]
    SchemaMismatch { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, SplayError>;

#[cfg(test)]
mod tests;
