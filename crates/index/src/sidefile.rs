//! On-disk layout of the index side-file.
//!
//! ```text
//! +-------+---------+-----------+--------------------------------+
//! | TIDX  | version | crc32(u32)| zstd(columnar body)            |
//! +-------+---------+-----------+--------------------------------+
//!
//! body: row_count(u64)
//!       symbol[row_count]   (varint length + utf-8)
//!       date[row_count]     (i32 days from CE)
//!       start[row_count]    (i64 ns since epoch; EARLIEST = i64::MIN)
//!       end[row_count]      (i64 ns since epoch; LATEST = i64::MAX)
//!       version[row_count]  (u32)
//!       path[row_count]     (varint length + utf-8, relative to the base)
//! ```
//!
//! The checksum covers the compressed body. The file is replaced atomically:
//! written to `index.tidx.tmp`, fsynced, renamed over `index.tidx`.

use crate::{IndexError, IndexKey, Result, VersionRecord};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use clock::{EARLIEST, LATEST};
use codec::SliceReader;
use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// Name of the side-file within the store base.
pub const INDEX_FILENAME: &str = "index.tidx";

const INDEX_TMP_FILENAME: &str = "index.tidx.tmp";
const MAGIC: &[u8; 4] = b"TIDX";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 4;
const COMPRESSION_LEVEL: i32 = 3;

pub(crate) fn save(path: &Path, rows: &[(&IndexKey, &VersionRecord)]) -> Result<()> {
    let body = encode_body(rows)?;
    let compressed = zstd::encode_all(body.as_slice(), COMPRESSION_LEVEL)?;

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.write_u8(FORMAT_VERSION)?;
    out.write_u32::<LittleEndian>(crc32fast::hash(&compressed))?;
    out.extend_from_slice(&compressed);

    let tmp_path = path.with_file_name(INDEX_TMP_FILENAME);
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        f.write_all(&out)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

pub(crate) fn load(path: &Path) -> Result<Vec<(IndexKey, VersionRecord)>> {
    let data = fs::read(path)?;
    let corrupt = |reason: String| IndexError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if data.len() < HEADER_LEN || &data[..4] != MAGIC {
        return Err(corrupt("bad magic".into()));
    }
    let mut header = Cursor::new(&data[4..HEADER_LEN]);
    let version = header.read_u8()?;
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {version}")));
    }
    let expected_crc = header.read_u32::<LittleEndian>()?;
    let compressed = &data[HEADER_LEN..];
    if crc32fast::hash(compressed) != expected_crc {
        return Err(corrupt("checksum mismatch".into()));
    }

    let body = zstd::decode_all(compressed).map_err(|e| corrupt(e.to_string()))?;
    decode_body(&body).map_err(|e| match e {
        IndexError::Corrupt { reason, .. } => corrupt(reason),
        other => other,
    })
}

fn encode_body(rows: &[(&IndexKey, &VersionRecord)]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    codec::put_u64(&mut out, rows.len() as u64);
    for (key, _) in rows {
        codec::put_string(&mut out, &key.symbol);
    }
    for (key, _) in rows {
        codec::put_i32(&mut out, key.date.num_days_from_ce());
    }
    for (_, v) in rows {
        codec::put_i64(&mut out, instant_to_nanos(v.start_time)?);
    }
    for (_, v) in rows {
        codec::put_i64(&mut out, instant_to_nanos(v.end_time)?);
    }
    for (_, v) in rows {
        codec::put_u32(&mut out, v.version);
    }
    for (_, v) in rows {
        let path = v
            .path
            .to_str()
            .ok_or_else(|| IndexError::NonUtf8Path(v.path.clone()))?;
        codec::put_string(&mut out, path);
    }
    Ok(out)
}

fn decode_body(body: &[u8]) -> Result<Vec<(IndexKey, VersionRecord)>> {
    let corrupt = |reason: String| IndexError::Corrupt {
        path: PathBuf::new(),
        reason,
    };
    let mut r = SliceReader::new(body, 0);
    let rows = r.read_u64().map_err(|e| corrupt(e.to_string()))?;
    // Every row needs at least 1 + 4 + 8 + 8 + 4 + 1 bytes.
    let n = usize::try_from(rows)
        .ok()
        .filter(|n| n.saturating_mul(26) <= body.len())
        .ok_or_else(|| corrupt(format!("row count {rows} exceeds body")))?;

    macro_rules! column {
        ($read:ident) => {{
            let mut col = Vec::with_capacity(n);
            for _ in 0..n {
                col.push(r.$read().map_err(|e| corrupt(e.to_string()))?);
            }
            col
        }};
    }

    let symbols: Vec<String> = column!(read_string);
    let days: Vec<i32> = column!(read_i32);
    let starts: Vec<i64> = column!(read_i64);
    let ends: Vec<i64> = column!(read_i64);
    let versions: Vec<u32> = column!(read_u32);
    let paths: Vec<String> = column!(read_string);

    if r.remaining() != 0 {
        return Err(corrupt(format!("{} trailing bytes", r.remaining())));
    }

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let date = NaiveDate::from_num_days_from_ce_opt(days[i])
            .ok_or_else(|| corrupt(format!("invalid date ordinal {}", days[i])))?;
        out.push((
            IndexKey {
                symbol: symbols[i].clone(),
                date,
            },
            VersionRecord {
                version: versions[i],
                start_time: nanos_to_instant(starts[i]),
                end_time: nanos_to_instant(ends[i]),
                path: PathBuf::from(&paths[i]),
            },
        ));
    }
    Ok(out)
}

fn instant_to_nanos(t: DateTime<Utc>) -> Result<i64> {
    if t == EARLIEST {
        Ok(i64::MIN)
    } else if t == LATEST {
        Ok(i64::MAX)
    } else {
        t.timestamp_nanos_opt()
            .filter(|n| *n != i64::MIN && *n != i64::MAX)
            .ok_or(IndexError::InstantOutOfRange(t))
    }
}

fn nanos_to_instant(n: i64) -> DateTime<Utc> {
    match n {
        i64::MIN => EARLIEST,
        i64::MAX => LATEST,
        n => Utc.timestamp_nanos(n),
    }
}
