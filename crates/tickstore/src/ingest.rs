//! Moving a finalized journal day into the tickstore.
//!
//! Each product in the day file becomes one batch with columns
//! `{time, sequence, trade_id, side, size, price}` (the first named by the
//! store's timestamp column), inserted as the new current version of
//! `(product, day)`.

use crate::{validate_symbol, BiTimestamp, Result, Tickstore, TickstoreError};
use chrono::NaiveDate;
use clock::to_nanos_saturating;
use journal::{Journal, JournalReader, Tick, TickSchema};
use splay::{Batch, ColumnData};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Default)]
struct Columns {
    time: Vec<i64>,
    sequence: Vec<i64>,
    trade_id: Vec<i64>,
    side: Vec<i16>,
    size: Vec<f64>,
    price: Vec<f64>,
}

impl Columns {
    fn push(&mut self, time: i64, tick: &Tick) {
        self.time.push(time);
        self.sequence.push(tick.sequence);
        self.trade_id.push(tick.trade_id);
        self.side.push(tick.side.code());
        self.size.push(tick.size);
        self.price.push(tick.price);
    }

    fn into_batch(self, timestamp_column: &str) -> Result<Batch> {
        Ok(Batch::new(vec![
            (timestamp_column, ColumnData::Timestamp(self.time)),
            ("sequence", ColumnData::Int64(self.sequence)),
            ("trade_id", ColumnData::Int64(self.trade_id)),
            ("side", ColumnData::Int16(self.side)),
            ("size", ColumnData::Float64(self.size)),
            ("price", ColumnData::Float64(self.price)),
        ])?)
    }
}

/// Replays `reader` from its current offset and groups ticks by product.
///
/// # Errors
///
/// - [`TickstoreError::Schema`] for a journal without timestamps, or a
///   tick whose timestamp is not a representable instant.
/// - Journal errors if the day is not finalized or a record is malformed.
pub fn batches_from_journal(
    reader: &mut JournalReader,
    timestamp_column: &str,
) -> Result<BTreeMap<String, Batch>> {
    if reader.schema() == TickSchema::WithoutTimestamp {
        return Err(TickstoreError::Schema(format!(
            "journal {} has no tick timestamps (schema v{})",
            reader.path().display(),
            reader.schema().version()
        )));
    }

    let mut products: BTreeMap<String, Columns> = BTreeMap::new();
    let mut bad_tick = None;
    reader.replay(|tick| {
        if bad_tick.is_some() {
            return;
        }
        match tick.time() {
            Some(t) => products
                .entry(tick.product.clone())
                .or_default()
                .push(to_nanos_saturating(t), &tick),
            None => bad_tick = Some(tick.sequence),
        }
    })?;
    if let Some(sequence) = bad_tick {
        return Err(TickstoreError::Schema(format!(
            "tick {sequence} in {} has no usable timestamp",
            reader.path().display()
        )));
    }

    products
        .into_iter()
        .map(|(product, cols)| Ok((product, cols.into_batch(timestamp_column)?)))
        .collect()
}

/// Inserts every product of the journal day `date` into `store` and returns
/// the splay files written, in product order.
///
/// Every product is checked against [`validate_symbol`] before anything is
/// inserted, so an unusable product name fails the whole day without
/// adding versions for the products that sort before it.
pub fn ingest_journal_day<S: Tickstore + ?Sized>(
    journal: &Journal,
    date: NaiveDate,
    store: &mut S,
    timestamp_column: &str,
) -> Result<Vec<PathBuf>> {
    let mut reader = journal.create_reader(date)?;
    let batches = batches_from_journal(&mut reader, timestamp_column)?;
    for product in batches.keys() {
        validate_symbol(product)?;
    }

    let mut written = Vec::with_capacity(batches.len());
    for (product, batch) in &batches {
        written.push(store.insert(product, BiTimestamp::new(date), batch)?);
    }
    tracing::info!(%date, products = written.len(), "ingested journal day");
    Ok(written)
}
