//! Rebuilds the index from the splay tree when no side-file exists.
//!
//! Layout scanned: `{base}/{yyyy}/{mm}/{dd}/{symbol}_{version:04}.{ext}`.
//! Files at the base (the side-file and its tmp) are skipped. A splay file
//! with no version suffix is renamed to version `0000` so a later scan finds
//! the same tree.

use crate::{IndexError, IndexKey, Result, VersionRecord};
use chrono::NaiveDate;
use clock::{EARLIEST, LATEST};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Splits a splay file name into symbol and optional version.
///
/// `BTC-USD_0003.tick` gives `("BTC-USD", Some(3))`, `BTC-USD.tick` gives
/// `("BTC-USD", None)`. Returns `None` when the extension does not match or
/// the symbol is empty.
#[must_use]
pub fn parse_splay_name<'a>(name: &'a str, extension: &str) -> Option<(&'a str, Option<u32>)> {
    let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
    if let Some((symbol, suffix)) = stem.rsplit_once('_') {
        if suffix.len() == 4 && suffix.bytes().all(|b| b.is_ascii_digit()) {
            if symbol.is_empty() {
                return None;
            }
            return suffix.parse().ok().map(|v| (symbol, Some(v)));
        }
    }
    if stem.is_empty() {
        None
    } else {
        Some((stem, None))
    }
}

pub(crate) fn scan(base: &Path, extension: &str) -> Result<Vec<(IndexKey, VersionRecord)>> {
    let mut found: BTreeMap<IndexKey, Vec<(u32, PathBuf)>> = BTreeMap::new();

    for (year_name, year_dir) in sorted_dirs(base, true)? {
        let year = parse_component(&year_name, 4, &year_dir)?;
        for (month_name, month_dir) in sorted_dirs(&year_dir, false)? {
            let month = parse_component(&month_name, 2, &month_dir)?;
            for (day_name, day_dir) in sorted_dirs(&month_dir, false)? {
                let day = parse_component(&day_name, 2, &day_dir)?;
                let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(|| {
                    corrupt(&day_dir, format!("{year}-{month}-{day} is not a date"))
                })?;
                let relative_dir = Path::new(&year_name).join(&month_name).join(&day_name);
                scan_day(&day_dir, &relative_dir, date, extension, &mut found)?;
            }
        }
    }

    let mut rows = Vec::new();
    for (key, mut versions) in found {
        versions.sort_by_key(|(v, _)| *v);
        let newest = versions.last().map(|(v, _)| *v);
        for (version, path) in versions {
            let end_time = if Some(version) == newest { LATEST } else { EARLIEST };
            rows.push((
                key.clone(),
                VersionRecord {
                    version,
                    start_time: EARLIEST,
                    end_time,
                    path,
                },
            ));
        }
    }
    Ok(rows)
}

fn scan_day(
    day_dir: &Path,
    relative_dir: &Path,
    date: NaiveDate,
    extension: &str,
    found: &mut BTreeMap<IndexKey, Vec<(u32, PathBuf)>>,
) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(day_dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for path in entries {
        let name = file_name(&path)?;
        if path.is_dir() {
            return Err(corrupt(&path, "unexpected directory in day partition".into()));
        }
        // Leftover from an interrupted splay write.
        if name.ends_with(".tmp") {
            tracing::warn!(path = %path.display(), "removing incomplete splay file");
            let _ = fs::remove_file(&path);
            continue;
        }

        let (symbol, version) = parse_splay_name(&name, extension)
            .ok_or_else(|| corrupt(&path, format!("not a .{extension} splay file")))?;
        let symbol = symbol.to_string();

        let (version, name) = match version {
            Some(v) => (v, name),
            None => {
                let renamed = format!("{symbol}_0000.{extension}");
                let target = day_dir.join(&renamed);
                if target.exists() {
                    return Err(corrupt(
                        &path,
                        format!("cannot version file, {renamed} already exists"),
                    ));
                }
                fs::rename(&path, &target)?;
                tracing::info!(from = %path.display(), to = %target.display(), "versioned splay file");
                (0, renamed)
            }
        };

        found
            .entry(IndexKey { symbol, date })
            .or_default()
            .push((version, relative_dir.join(name)));
    }
    Ok(())
}

/// Directory children sorted by name. At the base, plain files are skipped;
/// below it every child must be a directory.
fn sorted_dirs(dir: &Path, skip_files: bool) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            if skip_files {
                continue;
            }
            return Err(corrupt(&path, "unexpected file in date hierarchy".into()));
        }
        out.push((file_name(&path)?, path));
    }
    out.sort();
    Ok(out)
}

fn parse_component(name: &str, width: usize, path: &Path) -> Result<u32> {
    if name.len() != width || !name.bytes().all(|b| b.is_ascii_digit()) {
        return Err(corrupt(path, format!("expected {width} digits, found {name:?}")));
    }
    name.parse()
        .map_err(|_| corrupt(path, format!("expected {width} digits, found {name:?}")))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| IndexError::NonUtf8Path(path.to_path_buf()))
}

fn corrupt(path: &Path, reason: String) -> IndexError {
    IndexError::Corrupt {
        path: path.to_path_buf(),
        reason,
    }
}
