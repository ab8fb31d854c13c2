use crate::BitemporalIndex;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clock::ManualClock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const EXT: &str = "tick";

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 10, day).unwrap()
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap()
}

pub fn hours(h: i64) -> Duration {
    Duration::hours(h)
}

pub fn open_index(dir: &Path) -> (BitemporalIndex, ManualClock) {
    let clock = ManualClock::new(t0());
    let index = BitemporalIndex::open(dir, EXT, Arc::new(clock.clone())).unwrap();
    (index, clock)
}

pub fn splay_path(base: &Path, symbol: &str, date: NaiveDate, version: u32) -> PathBuf {
    base.join(date.format("%Y/%m/%d").to_string())
        .join(format!("{symbol}_{version:04}.{EXT}"))
}

/// Inserts a version and creates an empty file at its path.
pub fn insert(index: &mut BitemporalIndex, symbol: &str, date: NaiveDate) -> PathBuf {
    let base = index.base().to_path_buf();
    let path = index
        .insert(symbol, date, |v| splay_path(&base, symbol, date, v))
        .unwrap();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"").unwrap();
    path
}

pub fn touch(base: &Path, relative: &str) -> PathBuf {
    let path = base.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"x").unwrap();
    path
}
