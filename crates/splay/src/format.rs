use crate::{Batch, ColumnData, DataType, Result, SplayError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use codec::SliceReader;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"SPL1";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 4;

/// zstd level used when the caller has no preference.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Temporary path a splay file is staged at before the final rename.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `batch` to a new file at `path`, creating parent directories.
///
/// The data is staged at `<path>.tmp`, fsynced, and renamed into place, so
/// a crash leaves either no file or a complete one. Returns the number of
/// bytes written.
///
/// # Errors
///
/// [`SplayError::AlreadyExists`] if `path` exists; splay files are never
/// overwritten.
pub fn write_batch(path: &Path, batch: &Batch, compression_level: i32) -> Result<u64> {
    if path.exists() {
        return Err(SplayError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let body = encode_body(batch);
    let compressed = zstd::encode_all(body.as_slice(), compression_level)?;

    let tmp = tmp_path_for(path);
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        f.write_all(MAGIC)?;
        f.write_u8(FORMAT_VERSION)?;
        f.write_u32::<LittleEndian>(crc32fast::hash(&compressed))?;
        f.write_all(&compressed)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    let bytes = (HEADER_LEN + compressed.len()) as u64;
    tracing::debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        raw = body.len(),
        bytes,
        "wrote splay file"
    );
    Ok(bytes)
}

/// Reads a batch written by [`write_batch`].
pub fn read_batch(path: &Path) -> Result<Batch> {
    let data = fs::read(path)?;
    let corrupt = |reason: String| SplayError::Corrupt {
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
        SplayError::Codec(e) => corrupt(e.to_string()),
        SplayError::Corrupt { reason, .. } => corrupt(reason),
        other => other,
    })
}

fn encode_body(batch: &Batch) -> Vec<u8> {
    let mut out = Vec::new();
    codec::put_u64(&mut out, batch.num_rows() as u64);
    codec::put_u32(&mut out, batch.num_columns() as u32);
    for column in batch.columns() {
        codec::put_string(&mut out, &column.name);
        out.push(column.data.data_type().tag());
        match &column.data {
            ColumnData::Int16(v) => v.iter().for_each(|x| codec::put_i16(&mut out, *x)),
            ColumnData::Int64(v) | ColumnData::Timestamp(v) => {
                v.iter().for_each(|x| codec::put_i64(&mut out, *x))
            }
            ColumnData::Float64(v) => v.iter().for_each(|x| codec::put_f64(&mut out, *x)),
            ColumnData::Utf8(v) => v.iter().for_each(|x| codec::put_string(&mut out, x)),
        }
    }
    out
}

fn decode_body(body: &[u8]) -> Result<Batch> {
    let corrupt = |reason: String| SplayError::Corrupt {
        path: PathBuf::new(),
        reason,
    };
    let mut r = SliceReader::new(body, 0);
    let rows = usize::try_from(r.read_u64()?).map_err(|_| corrupt("row count overflow".into()))?;
    let columns = r.read_u32()?;

    let mut batch = Batch::empty();
    for _ in 0..columns {
        let name = r.read_string()?;
        let tag = r.read_u8()?;
        let ty = DataType::from_tag(tag).ok_or_else(|| corrupt(format!("unknown type tag {tag}")))?;
        // Every value takes at least one byte.
        if rows > r.remaining() {
            return Err(corrupt(format!("column {name:?} truncated")));
        }

        macro_rules! values {
            ($read:ident) => {{
                let mut v = Vec::with_capacity(rows);
                for _ in 0..rows {
                    v.push(r.$read()?);
                }
                v
            }};
        }

        let data = match ty {
            DataType::Int16 => ColumnData::Int16(values!(read_i16)),
            DataType::Int64 => ColumnData::Int64(values!(read_i64)),
            DataType::Float64 => ColumnData::Float64(values!(read_f64)),
            DataType::Utf8 => ColumnData::Utf8(values!(read_string)),
            DataType::Timestamp => ColumnData::Timestamp(values!(read_i64)),
        };
        batch
            .push_column(name, data)
            .map_err(|e| corrupt(e.to_string()))?;
    }

    if r.remaining() != 0 {
        return Err(corrupt(format!("{} trailing bytes", r.remaining())));
    }
    if columns == 0 && rows != 0 {
        return Err(corrupt(format!("{rows} rows without columns")));
    }
    Ok(batch)
}
