//! Write path: lazy day-file creation, rollover and finalization.
//!
//! Every write first resolves the active day against the clock. When the
//! date has changed, the previous file's header is finalized and the file
//! unmapped before the new day is mapped, so a write never lands in a stale
//! mapping.

use chrono::NaiveDate;
use codec::{encoded_string_len, SliceReader, SliceWriter};
use memmap2::MmapMut;
use std::path::{Path, PathBuf};

use crate::schema::{epoch_seconds, scan_end};
use crate::{Journal, JournalError, Result, Tick, TickSchema, HEADER_LEN};

/// The day file currently being appended to.
struct ActiveDay {
    date: NaiveDate,
    path: PathBuf,
    mmap: MmapMut,
    /// Next write offset.
    pos: usize,
    /// Usable extent: the smaller of the journal capacity and the file size.
    limit: usize,
}

impl ActiveDay {
    fn check_space(&self, size: usize) -> Result<()> {
        if self.pos + size >= self.limit {
            return Err(JournalError::NoSpace {
                position: self.pos,
                requested: size,
                capacity: self.limit,
            });
        }
        Ok(())
    }

    /// Stores `!bytes_written` in the header, flushes and unmaps.
    fn finalize(mut self) -> Result<usize> {
        let written = self.pos - HEADER_LEN;
        SliceWriter::new(&mut self.mmap[..HEADER_LEN], 0).write_i32(!(written as i32))?;
        self.mmap.flush()?;
        tracing::info!(
            date = %self.date,
            path = %self.path.display(),
            bytes = written,
            "finalized journal day file"
        );
        Ok(written)
    }
}

/// Sequential writer over the journal's day files.
///
/// Obtained from [`Journal::create_appender`]. Dropping the appender
/// finalizes the active day on a best-effort basis; call
/// [`close`](JournalAppender::close) to observe errors.
pub struct JournalAppender {
    journal: Journal,
    active: Option<ActiveDay>,
}

impl std::fmt::Debug for JournalAppender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalAppender")
            .field("base_path", &self.journal.base_path())
            .field("current_date", &self.current_date())
            .field("position", &self.position())
            .finish()
    }
}

impl JournalAppender {
    pub(crate) fn new(journal: Journal) -> Self {
        Self {
            journal,
            active: None,
        }
    }

    /// Date of the mapped day file, if any.
    #[must_use]
    pub fn current_date(&self) -> Option<NaiveDate> {
        self.active.as_ref().map(|a| a.date)
    }

    /// Offset of the next write in the active file ([`HEADER_LEN`] when
    /// nothing is mapped).
    #[must_use]
    pub fn position(&self) -> usize {
        self.active.as_ref().map_or(HEADER_LEN, |a| a.pos)
    }

    pub fn write_byte(&mut self, v: i8) -> Result<()> {
        self.write_with(1, |w| w.write_i8(v))
    }

    pub fn write_boolean(&mut self, v: bool) -> Result<()> {
        self.write_with(1, |w| w.write_bool(v))
    }

    pub fn write_short(&mut self, v: i16) -> Result<()> {
        self.write_with(2, |w| w.write_i16(v))
    }

    pub fn write_int(&mut self, v: i32) -> Result<()> {
        self.write_with(4, |w| w.write_i32(v))
    }

    pub fn write_long(&mut self, v: i64) -> Result<()> {
        self.write_with(8, |w| w.write_i64(v))
    }

    pub fn write_float(&mut self, v: f32) -> Result<()> {
        self.write_with(4, |w| w.write_f32(v))
    }

    pub fn write_double(&mut self, v: f64) -> Result<()> {
        self.write_with(8, |w| w.write_f64(v))
    }

    /// Writes a varint length prefix and the UTF-8 bytes of `v`. Space for
    /// both is checked before either is written.
    pub fn write_string(&mut self, v: &str) -> Result<()> {
        self.write_with(encoded_string_len(v), |w| w.write_string(v))
    }

    /// Appends one tick using the journal's schema.
    ///
    /// The whole record is sized up front: if it does not fit, no field of
    /// it is written. Under [`TickSchema::WithTimestamp`] a tick without a
    /// timestamp is stamped with the journal clock. A tick with an empty
    /// product fails with [`JournalError::EmptyProduct`].
    pub fn append_tick(&mut self, tick: &Tick) -> Result<()> {
        if tick.product.is_empty() {
            return Err(JournalError::EmptyProduct {
                sequence: tick.sequence,
            });
        }
        let schema = self.journal.schema();
        let stamped;
        let tick = if schema == TickSchema::WithTimestamp && tick.timestamp.is_none() {
            stamped = Tick {
                timestamp: Some(epoch_seconds(self.journal.clock().now())),
                ..tick.clone()
            };
            &stamped
        } else {
            tick
        };
        self.write_with(schema.record_len(tick), |w| tick.encode(w, schema))
    }

    /// Flushes dirty pages of the active file without finalizing it.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(day) = &self.active {
            day.mmap.flush()?;
        }
        Ok(())
    }

    /// Finalizes and unmaps the active file. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<()> {
        if let Some(day) = self.active.take() {
            day.finalize()?;
        }
        Ok(())
    }

    fn write_with<F>(&mut self, size: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut SliceWriter<'_>) -> codec::Result<()>,
    {
        let day = self.active_day()?;
        day.check_space(size)?;
        let limit = day.limit;
        let mut w = SliceWriter::new(&mut day.mmap[..limit], day.pos);
        f(&mut w)?;
        day.pos = w.position();
        Ok(())
    }

    /// Returns the mapping for today, rolling over first if the date moved.
    fn active_day(&mut self) -> Result<&mut ActiveDay> {
        let today = self.journal.clock().today();
        let day = match self.active.take() {
            Some(day) if day.date == today => day,
            previous => {
                if let Some(prev) = previous {
                    tracing::info!(from = %prev.date, to = %today, "journal rollover");
                    prev.finalize()?;
                }
                self.open_day(today)?
            }
        };
        Ok(self.active.insert(day))
    }

    fn open_day(&self, date: NaiveDate) -> Result<ActiveDay> {
        let (mut mmap, created) = self.journal.map_for_append(date)?;
        let path = self.journal.day_path(date);
        let limit = mmap.len().min(self.journal.capacity());
        let pos = if created {
            HEADER_LEN
        } else {
            resume_position(&mut mmap[..limit], &path, date, self.journal.schema())?
        };
        Ok(ActiveDay {
            date,
            path,
            mmap,
            pos,
            limit,
        })
    }
}

/// Works out where to continue appending in an existing day file.
///
/// A finalized header gives the length directly; the header is then reset
/// to `0` because the file is open again. An unfinalized file (writer died
/// before closing) is recovered by scanning complete ticks.
fn resume_position(
    buf: &mut [u8],
    path: &Path,
    date: NaiveDate,
    schema: TickSchema,
) -> Result<usize> {
    let header = SliceReader::new(buf, 0).read_i32()?;
    if header == 0 {
        let end = scan_end(buf, HEADER_LEN, schema);
        tracing::warn!(
            %date,
            path = %path.display(),
            recovered_bytes = end - HEADER_LEN,
            "reopened unfinalized journal; resuming after last complete tick"
        );
        return Ok(end);
    }
    let len = !header;
    if len < 0 || HEADER_LEN + len as usize > buf.len() {
        return Err(JournalError::CorruptHeader {
            path: path.to_path_buf(),
            header,
        });
    }
    SliceWriter::new(&mut buf[..HEADER_LEN], 0).write_i32(0)?;
    tracing::info!(%date, bytes = len, "reopened finalized journal for append");
    Ok(HEADER_LEN + len as usize)
}

/// Best-effort finalization on drop.
impl Drop for JournalAppender {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
