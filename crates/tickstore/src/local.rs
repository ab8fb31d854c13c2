use crate::{BiTimestamp, Result, Tickstore, TickstoreError};
use chrono::{DateTime, NaiveDate, Utc};
use clock::{to_nanos_saturating, Clock};
use index::BitemporalIndex;
use splay::{Batch, DEFAULT_COMPRESSION_LEVEL};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings for a [`LocalTickstore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTickstoreOptions {
    /// Timestamp column used to narrow and order `select` results.
    pub timestamp_column: String,
    /// Splay file extension, without the dot.
    pub extension: String,
    /// zstd level for splay files.
    pub compression_level: i32,
}

impl Default for LocalTickstoreOptions {
    fn default() -> Self {
        Self {
            timestamp_column: "time".to_string(),
            extension: "tick".to_string(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// `{base}/{yyyy}/{mm}/{dd}/{symbol}_{version:04}.{extension}`
pub fn splay_path(base: &Path, symbol: &str, date: NaiveDate, version: u32, extension: &str) -> PathBuf {
    base.join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(date.format("%d").to_string())
        .join(format!("{symbol}_{version:04}.{extension}"))
}

/// Tickstore on the local filesystem.
///
/// The index side-file and the splay tree share `base`. The index is
/// persisted after every successful mutation.
#[derive(Debug)]
pub struct LocalTickstore {
    base: PathBuf,
    options: LocalTickstoreOptions,
    index: BitemporalIndex,
    open: bool,
}

impl LocalTickstore {
    /// Opens (or creates) a store under `base`.
    ///
    /// An existing splay tree without an index side-file is indexed by
    /// scanning it.
    pub fn open<P: AsRef<Path>>(
        base: P,
        options: LocalTickstoreOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let index = BitemporalIndex::open(&base, &options.extension, clock)?;
        tracing::info!(
            base = %base.display(),
            rows = index.len(),
            symbols = index.symbols().len(),
            "opened tickstore"
        );
        Ok(Self {
            base,
            options,
            index,
            open: true,
        })
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn options(&self) -> &LocalTickstoreOptions {
        &self.options
    }

    /// Read access to the underlying index (history, status, symbols).
    #[must_use]
    pub fn index(&self) -> &BitemporalIndex {
        &self.index
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(TickstoreError::Closed)
        }
    }
}

/// Checks that `symbol` can be used as a splay file name component.
///
/// # Errors
///
/// [`TickstoreError::InvalidSymbol`] for an empty symbol, a leading `.`,
/// or a path separator or NUL anywhere in it.
pub fn validate_symbol(symbol: &str) -> Result<()> {
    let bad = symbol.is_empty()
        || symbol.starts_with('.')
        || symbol.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    if bad {
        Err(TickstoreError::InvalidSymbol(symbol.to_string()))
    } else {
        Ok(())
    }
}

impl Tickstore for LocalTickstore {
    fn select(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Result<Batch> {
        self.ensure_open()?;
        if start > end {
            return Ok(Batch::empty());
        }

        let entries = self
            .index
            .select(symbol, start.date_naive(), end.date_naive(), as_of);
        let mut parts = Vec::with_capacity(entries.len());
        for entry in &entries {
            parts.push(splay::read_batch(&entry.path)?);
        }
        let merged = Batch::concat(&parts)?;

        let column = &self.options.timestamp_column;
        let out = merged
            .filter_time_range(column, to_nanos_saturating(start), to_nanos_saturating(end))?
            .sort_by_time(column)?;
        tracing::debug!(
            symbol,
            %start,
            %end,
            %as_of,
            files = entries.len(),
            rows = out.num_rows(),
            "select"
        );
        Ok(out)
    }

    fn insert(&mut self, symbol: &str, ts: BiTimestamp, batch: &Batch) -> Result<PathBuf> {
        self.ensure_open()?;
        validate_symbol(symbol)?;
        if batch.num_rows() > 0 {
            batch.timestamps(&self.options.timestamp_column)?;
        }

        let version = self.index.next_version(symbol, ts.as_at)?;
        let path = splay_path(&self.base, symbol, ts.as_at, version, &self.options.extension);

        // A file at an uncommitted version was left by a write whose index
        // row never reached disk.
        if path.exists() {
            tracing::warn!(path = %path.display(), "removing orphaned splay file");
            fs::remove_file(&path)?;
        }
        splay::write_batch(&path, batch, self.options.compression_level)?;

        let committed = self.index.insert(symbol, ts.as_at, |_| path.clone())?;
        self.index.flush()?;
        tracing::info!(
            symbol,
            as_at = %ts.as_at,
            version,
            rows = batch.num_rows(),
            "inserted version"
        );
        Ok(committed)
    }

    fn delete(&mut self, symbol: &str, ts: BiTimestamp) -> Result<bool> {
        self.ensure_open()?;
        let deleted = self.index.delete(symbol, ts.as_at);
        if deleted {
            self.index.flush()?;
            tracing::info!(symbol, as_at = %ts.as_at, "deleted");
        }
        Ok(deleted)
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.index.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.index.flush()?;
        self.open = false;
        tracing::debug!(base = %self.base.display(), "closed tickstore");
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.index.discard();
        self.open = false;
        match fs::remove_dir_all(&self.base) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(base = %self.base.display(), "destroyed tickstore");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Best-effort close on drop.
impl Drop for LocalTickstore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
