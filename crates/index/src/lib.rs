//! # Index - Bitemporal Splay Index
//!
//! Maps `(symbol, as-at date)` to the versioned splay files that hold its
//! ticks, and records *when* each version was the current one.
//!
//! ```text
//! (BTC-USD, 2019-10-01) ─┬─ v0  [EARLIEST, t1)      2019/10/01/BTC-USD_0000.tick
//!                        └─ v1  [t1, LATEST]        2019/10/01/BTC-USD_0001.tick
//! (BTC-USD, 2019-10-02) ─── v0  [EARLIEST, t2)      2019/10/02/BTC-USD_0000.tick   (deleted at t2)
//! ```
//!
//! ## Invariants
//!
//! - Per key, versions are ascending and at most one has
//!   `end_time == LATEST` (the current version).
//! - Inserting closes the current version at "now" and appends
//!   `prev + 1`, valid from "now". The very first version of a key is valid
//!   from [`EARLIEST`].
//! - Deleting closes the current version without adding one.
//! - A version is visible as of `t` when `start_time <= t < end_time`; the
//!   current version is also visible as of [`LATEST`].
//!
//! ## Persistence
//!
//! The table lives in memory and is written to `index.tidx` in the store
//! base by [`flush`](BitemporalIndex::flush) (see `sidefile.rs` for the
//! layout). When the side-file is missing, the table is rebuilt by scanning
//! the splay tree (see `bootstrap.rs`).

mod bootstrap;
mod sidefile;

pub use bootstrap::parse_splay_name;
pub use sidefile::INDEX_FILENAME;

use chrono::{DateTime, NaiveDate, Utc};
use clock::{Clock, EARLIEST, LATEST};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Highest version a splay filename can carry (`{symbol}_{version:04}`).
pub const MAX_VERSION: u32 = 9999;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The side-file or the splay tree could not be interpreted.
    #[error("corrupt index at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The key already has [`MAX_VERSION`] versions.
    #[error("no versions left for {symbol} on {date}")]
    VersionOverflow { symbol: String, date: NaiveDate },

    /// An instant outside the range the side-file can store.
    #[error("instant {0} cannot be persisted")]
    InstantOutOfRange(DateTime<Utc>),

    /// Paths are persisted as UTF-8.
    #[error("path is not valid utf-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Composite key: symbol and the calendar date the data represents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey {
    pub symbol: String,
    pub date: NaiveDate,
}

impl IndexKey {
    pub fn new(symbol: &str, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
        }
    }
}

/// One stored version of a key. `path` is relative to the index base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VersionRecord {
    pub(crate) version: u32,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: DateTime<Utc>,
    pub(crate) path: PathBuf,
}

impl VersionRecord {
    fn is_current(&self) -> bool {
        self.end_time == LATEST
    }

    fn visible_at(&self, as_of: DateTime<Utc>) -> bool {
        self.start_time <= as_of && (as_of < self.end_time || self.is_current())
    }
}

/// A row of the index as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub symbol: String,
    pub date: NaiveDate,
    pub version: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Absolute path of the splay file.
    pub path: PathBuf,
}

impl IndexEntry {
    /// `true` for the version that has not been superseded or deleted.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.end_time == LATEST
    }
}

/// Whether a key has a current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    /// Never inserted.
    Absent,
    /// Current version.
    Live(u32),
    /// Inserted, then deleted; carries the last version that was live.
    Deleted(u32),
}

/// In-memory bitemporal table backed by a compressed side-file.
pub struct BitemporalIndex {
    base: PathBuf,
    extension: String,
    clock: Arc<dyn Clock>,
    keys: BTreeMap<IndexKey, Vec<VersionRecord>>,
    dirty: bool,
}

impl std::fmt::Debug for BitemporalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitemporalIndex")
            .field("base", &self.base)
            .field("extension", &self.extension)
            .field("keys", &self.keys.len())
            .field("rows", &self.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl BitemporalIndex {
    /// Opens the index stored under `base`.
    ///
    /// Loads `index.tidx` when present. Otherwise the splay tree under
    /// `base` is scanned for `{yyyy}/{mm}/{dd}/{symbol}_{version:04}.{extension}`
    /// files, un-versioned files are renamed to version `0000`, and the
    /// rebuilt table is persisted.
    ///
    /// # Errors
    ///
    /// [`IndexError::Corrupt`] for an unreadable side-file or a splay tree
    /// entry whose date or name cannot be parsed.
    pub fn open<P: AsRef<Path>>(base: P, extension: &str, clock: Arc<dyn Clock>) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        std::fs::create_dir_all(&base)?;

        let side_file = base.join(INDEX_FILENAME);
        let (keys, dirty) = if side_file.exists() {
            let rows = sidefile::load(&side_file)?;
            (collect_rows(rows, &side_file), false)
        } else {
            let rows = bootstrap::scan(&base, extension)?;
            tracing::info!(
                base = %base.display(),
                rows = rows.len(),
                "bootstrapped index from splay tree"
            );
            (collect_rows(rows, &side_file), true)
        };

        let mut index = Self {
            base,
            extension: extension.to_string(),
            clock,
            keys,
            dirty,
        };
        index.flush()?;
        Ok(index)
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Total number of rows across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Distinct symbols, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for key in self.keys.keys() {
            if out.last() != Some(&key.symbol) {
                out.push(key.symbol.clone());
            }
        }
        out
    }

    /// Version the next insert for this key will receive.
    pub fn next_version(&self, symbol: &str, date: NaiveDate) -> Result<u32> {
        match self
            .keys
            .get(&IndexKey::new(symbol, date))
            .and_then(|v| v.last())
        {
            None => Ok(0),
            Some(last) if last.version < MAX_VERSION => Ok(last.version + 1),
            Some(_) => Err(IndexError::VersionOverflow {
                symbol: symbol.to_string(),
                date,
            }),
        }
    }

    /// Rows for `symbol` with a date in `[start_date, end_date]` that were
    /// current as of `as_of`, in date order.
    pub fn select(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        as_of: DateTime<Utc>,
    ) -> Vec<IndexEntry> {
        if start_date > end_date {
            return Vec::new();
        }
        let lo = IndexKey::new(symbol, start_date);
        let hi = IndexKey::new(symbol, end_date);
        self.keys
            .range(lo..=hi)
            .flat_map(|(key, versions)| {
                versions
                    .iter()
                    .filter(move |v| v.visible_at(as_of))
                    .map(move |v| self.entry(key, v))
            })
            .collect()
    }

    /// Records a new version of `(symbol, as_at)` and returns its path.
    ///
    /// `path_builder` receives the new version number so the file name can
    /// embed it. The previous current version, if any, is closed at the
    /// clock's "now".
    pub fn insert<F>(&mut self, symbol: &str, as_at: NaiveDate, path_builder: F) -> Result<PathBuf>
    where
        F: FnOnce(u32) -> PathBuf,
    {
        let version = self.next_version(symbol, as_at)?;
        let path = path_builder(version);
        let relative = self.relativize(&path);
        let now = self.clock.now();

        let versions = self.keys.entry(IndexKey::new(symbol, as_at)).or_default();
        let start_time = if versions.is_empty() { EARLIEST } else { now };
        if let Some(current) = versions.iter_mut().find(|v| v.is_current()) {
            current.end_time = now;
        }
        versions.push(VersionRecord {
            version,
            start_time,
            end_time: LATEST,
            path: relative,
        });
        self.dirty = true;

        tracing::debug!(symbol, %as_at, version, path = %path.display(), "index insert");
        Ok(path)
    }

    /// Closes the current version of `(symbol, as_at)` at "now".
    ///
    /// No row is added for the deletion. Returns `false` when there was no
    /// current version.
    pub fn delete(&mut self, symbol: &str, as_at: NaiveDate) -> bool {
        let now = self.clock.now();
        let current = self
            .keys
            .get_mut(&IndexKey::new(symbol, as_at))
            .and_then(|versions| versions.iter_mut().find(|v| v.is_current()));
        match current {
            Some(v) => {
                v.end_time = now;
                self.dirty = true;
                tracing::debug!(symbol, %as_at, version = v.version, "index delete");
                true
            }
            None => false,
        }
    }

    /// Full version history of a key, oldest first.
    #[must_use]
    pub fn versions(&self, symbol: &str, date: NaiveDate) -> Vec<IndexEntry> {
        let key = IndexKey::new(symbol, date);
        self.keys
            .get(&key)
            .map(|versions| versions.iter().map(|v| self.entry(&key, v)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn status(&self, symbol: &str, date: NaiveDate) -> KeyStatus {
        match self.keys.get(&IndexKey::new(symbol, date)) {
            None => KeyStatus::Absent,
            Some(versions) => match versions.iter().find(|v| v.is_current()) {
                Some(current) => KeyStatus::Live(current.version),
                None => KeyStatus::Deleted(versions.last().map_or(0, |v| v.version)),
            },
        }
    }

    /// Persists the table if it changed since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let rows: Vec<(&IndexKey, &VersionRecord)> = self
            .keys
            .iter()
            .flat_map(|(k, versions)| versions.iter().map(move |v| (k, v)))
            .collect();
        sidefile::save(&self.base.join(INDEX_FILENAME), &rows)?;
        self.dirty = false;
        tracing::debug!(rows = rows.len(), "index flushed");
        Ok(())
    }

    /// Forgets all in-memory state without persisting it.
    pub fn discard(&mut self) {
        self.keys.clear();
        self.dirty = false;
    }

    fn entry(&self, key: &IndexKey, v: &VersionRecord) -> IndexEntry {
        IndexEntry {
            symbol: key.symbol.clone(),
            date: key.date,
            version: v.version,
            start_time: v.start_time,
            end_time: v.end_time,
            path: self.base.join(&v.path),
        }
    }

    fn relativize(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Groups rows by key, keeping the first occurrence of a duplicated
/// `(symbol, date, version)` and leaving at most one current version.
fn collect_rows(
    rows: Vec<(IndexKey, VersionRecord)>,
    source: &Path,
) -> BTreeMap<IndexKey, Vec<VersionRecord>> {
    let mut keys: BTreeMap<IndexKey, Vec<VersionRecord>> = BTreeMap::new();
    for (key, record) in rows {
        let versions = keys.entry(key).or_default();
        if versions.iter().any(|v| v.version == record.version) {
            tracing::warn!(
                source = %source.display(),
                version = record.version,
                "dropping duplicate index row"
            );
            continue;
        }
        versions.push(record);
    }
    for versions in keys.values_mut() {
        versions.sort_by_key(|v| v.version);
        let n = versions.len();
        for i in 0..n.saturating_sub(1) {
            if versions[i].is_current() {
                let successor_start = versions[i + 1].start_time;
                tracing::warn!(
                    version = versions[i].version,
                    "closing superseded version still marked current"
                );
                versions[i].end_time = successor_start;
            }
        }
    }
    keys
}

/// Best-effort flush on drop.
impl Drop for BitemporalIndex {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests;
