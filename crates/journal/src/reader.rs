//! Read path: sequential decoding over a mapped day file.

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDate;
use codec::SliceReader;
use memmap2::Mmap;
use std::path::{Path, PathBuf};

use crate::schema::scan;
use crate::{JournalError, Result, Tick, TickSchema, HEADER_LEN};

/// Sequential reader over one day file.
///
/// Reads are bounded by the logical extent (`HEADER_LEN + length`) once
/// the file is finalized, and by the physical mapping while it is still
/// open. Reading a day that is still being appended is not safe to rely
/// on; [`replay`](JournalReader::replay) refuses to do it.
pub struct JournalReader {
    date: NaiveDate,
    path: PathBuf,
    mmap: Mmap,
    offset: usize,
    schema: TickSchema,
}

impl std::fmt::Debug for JournalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalReader")
            .field("date", &self.date)
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("length", &self.content_len())
            .finish()
    }
}

impl JournalReader {
    pub(crate) fn new(date: NaiveDate, path: PathBuf, mmap: Mmap, schema: TickSchema) -> Self {
        Self {
            date,
            path,
            mmap,
            offset: HEADER_LEN,
            schema,
        }
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn schema(&self) -> TickSchema {
        self.schema
    }

    /// Current read offset from the start of the file.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn header(&self) -> i32 {
        LittleEndian::read_i32(&self.mmap[..HEADER_LEN])
    }

    /// One's complement of the stored header: the number of record bytes
    /// once finalized.
    ///
    /// An unfinalized file has a zero header, for which this returns `-1`;
    /// check [`is_finalized`](JournalReader::is_finalized) first.
    #[must_use]
    pub fn get_length(&self) -> i32 {
        !self.header()
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.header() != 0
    }

    /// Record byte count, if finalized and consistent with the file size.
    #[must_use]
    pub fn content_len(&self) -> Option<usize> {
        if !self.is_finalized() {
            return None;
        }
        let len = usize::try_from(self.get_length()).ok()?;
        (HEADER_LEN + len <= self.mmap.len()).then_some(len)
    }

    fn limit(&self) -> usize {
        match self.content_len() {
            Some(len) => HEADER_LEN + len,
            None => self.mmap.len(),
        }
    }

    /// Bytes left before the readable extent.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit().saturating_sub(self.offset)
    }

    fn read_with<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SliceReader<'_>) -> codec::Result<T>,
    {
        let limit = self.limit();
        let mut r = SliceReader::new(&self.mmap[..limit], self.offset);
        let value = f(&mut r)?;
        self.offset = r.position();
        Ok(value)
    }

    pub fn read_byte(&mut self) -> Result<i8> {
        self.read_with(|r| r.read_i8())
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        self.read_with(|r| r.read_bool())
    }

    pub fn read_short(&mut self) -> Result<i16> {
        self.read_with(|r| r.read_i16())
    }

    pub fn read_int(&mut self) -> Result<i32> {
        self.read_with(|r| r.read_i32())
    }

    pub fn read_long(&mut self) -> Result<i64> {
        self.read_with(|r| r.read_i64())
    }

    pub fn read_float(&mut self) -> Result<f32> {
        self.read_with(|r| r.read_f32())
    }

    pub fn read_double(&mut self) -> Result<f64> {
        self.read_with(|r| r.read_f64())
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.read_with(|r| r.read_string())
    }

    /// Decodes one tick using the journal's schema.
    pub fn read_tick(&mut self) -> Result<Tick> {
        let schema = self.schema;
        self.read_with(|r| Tick::decode(r, schema))
    }

    /// The last complete tick in the file, without moving the offset.
    ///
    /// Unlike [`replay`](JournalReader::replay) this also works on a day
    /// that was never finalized, using the same scan an appender uses to
    /// resume it.
    #[must_use]
    pub fn last_tick(&self) -> Option<Tick> {
        scan(&self.mmap[..self.limit()], HEADER_LEN, self.schema).1
    }

    /// Replays every tick from the current offset to the end of the
    /// finalized content, returning how many were applied.
    ///
    /// # Errors
    ///
    /// - [`JournalError::Unfinalized`] if the header is still zero.
    /// - A codec error if the content ends mid-record or is malformed.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<usize>
    where
        F: FnMut(Tick),
    {
        if !self.is_finalized() {
            return Err(JournalError::Unfinalized(self.date));
        }
        if self.content_len().is_none() {
            return Err(JournalError::CorruptHeader {
                path: self.path.clone(),
                header: self.header(),
            });
        }
        let mut count = 0;
        while self.remaining() > 0 {
            apply(self.read_tick()?);
            count += 1;
        }
        Ok(count)
    }
}
