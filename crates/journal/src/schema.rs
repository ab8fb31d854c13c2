//! Tick record layouts.
//!
//! Two layouts have been written in production and nothing in a day file
//! says which one it holds, so the schema is configuration on the
//! [`Journal`](crate::Journal) rather than something the reader detects.
//!
//! ```text
//! v1: timestamp f64 | sequence i64 | trade_id i64 | product string | side i16 | size f64 | price f64
//! v2:                 sequence i64 | trade_id i64 | product string | side i16 | size f64 | price f64
//! ```

use chrono::{DateTime, Utc};
use codec::{encoded_string_len, CodecError, SliceReader, SliceWriter};

/// Versioned record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickSchema {
    /// Leading receive timestamp (epoch seconds as f64).
    #[default]
    WithTimestamp = 1,
    /// No timestamp field.
    WithoutTimestamp = 2,
}

impl TickSchema {
    #[must_use]
    pub fn version(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_version(version: u8) -> Option<Self> {
        match version {
            1 => Some(TickSchema::WithTimestamp),
            2 => Some(TickSchema::WithoutTimestamp),
            _ => None,
        }
    }

    /// Encoded size of `tick` under this layout.
    #[must_use]
    pub fn record_len(self, tick: &Tick) -> usize {
        let ts = match self {
            TickSchema::WithTimestamp => 8,
            TickSchema::WithoutTimestamp => 0,
        };
        ts + 8 + 8 + encoded_string_len(&tick.product) + 2 + 8 + 8
    }
}

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub fn code(self) -> i16 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }
}

impl TryFrom<i16> for Side {
    type Error = CodecError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Side::Buy),
            1 => Ok(Side::Sell),
            other => Err(CodecError::Encoding(format!("unknown side code {other}"))),
        }
    }
}

/// One trade print as captured from the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Receive time in epoch seconds. `None` under the v2 layout, or when
    /// the appender should stamp it.
    pub timestamp: Option<f64>,
    pub sequence: i64,
    pub trade_id: i64,
    pub product: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
}

impl Tick {
    /// Receive time as a UTC instant, if present and representable.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        let ts = self.timestamp?;
        if !ts.is_finite() {
            return None;
        }
        let secs = ts.floor();
        let nanos = ((ts - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }

    pub(crate) fn encode(&self, w: &mut SliceWriter<'_>, schema: TickSchema) -> codec::Result<()> {
        if schema == TickSchema::WithTimestamp {
            w.write_f64(self.timestamp.unwrap_or_default())?;
        }
        w.write_i64(self.sequence)?;
        w.write_i64(self.trade_id)?;
        w.write_string(&self.product)?;
        w.write_i16(self.side.code())?;
        w.write_f64(self.size)?;
        w.write_f64(self.price)
    }

    pub(crate) fn decode(r: &mut SliceReader<'_>, schema: TickSchema) -> codec::Result<Tick> {
        let timestamp = match schema {
            TickSchema::WithTimestamp => Some(r.read_f64()?),
            TickSchema::WithoutTimestamp => None,
        };
        let sequence = r.read_i64()?;
        let trade_id = r.read_i64()?;
        let product = r.read_string()?;
        let side = Side::try_from(r.read_i16()?)?;
        let size = r.read_f64()?;
        let price = r.read_f64()?;
        Ok(Tick {
            timestamp,
            sequence,
            trade_id,
            product,
            side,
            size,
            price,
        })
    }
}

/// Epoch seconds with sub-second precision.
pub(crate) fn epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9
}

/// Finds the end of the last complete tick in `buf`, scanning from `start`.
///
/// Zero-filled space decodes as a tick with an empty product, which is how
/// the scan recognizes where an unfinalized file stops.
pub(crate) fn scan_end(buf: &[u8], start: usize, schema: TickSchema) -> usize {
    scan(buf, start, schema).0
}

/// Like [`scan_end`], also returning the last complete tick.
pub(crate) fn scan(buf: &[u8], start: usize, schema: TickSchema) -> (usize, Option<Tick>) {
    let mut end = start;
    let mut last = None;
    loop {
        let mut r = SliceReader::new(buf, end);
        match Tick::decode(&mut r, schema) {
            Ok(tick) if !tick.product.is_empty() => {
                end = r.position();
                last = Some(tick);
            }
            _ => return (end, last),
        }
    }
}
