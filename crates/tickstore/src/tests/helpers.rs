use crate::{Batch, ColumnData, LocalTickstore, LocalTickstoreOptions};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clock::{to_nanos_saturating, ManualClock};
use std::path::Path;
use std::sync::Arc;

pub fn oct(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 10, day).unwrap()
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 10, day, hour, 0, 0).unwrap()
}

/// Wall clock of the store: well after the data it holds.
pub fn wall() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 11, 1, 8, 0, 0).unwrap()
}

pub fn open_store(dir: &Path) -> (LocalTickstore, ManualClock) {
    let clock = ManualClock::new(wall());
    let store =
        LocalTickstore::open(dir, LocalTickstoreOptions::default(), Arc::new(clock.clone()))
            .unwrap();
    (store, clock)
}

/// One tick per hour of `day`, newest first, with `price` tagging the batch.
pub fn day_batch(day: u32, price: f64) -> Batch {
    let times: Vec<i64> = (0..24)
        .rev()
        .map(|h| to_nanos_saturating(at(day, h)))
        .collect();
    let n = times.len();
    Batch::new(vec![
        ("time", ColumnData::Timestamp(times)),
        ("price", ColumnData::Float64(vec![price; n])),
    ])
    .unwrap()
}

pub fn prices(batch: &Batch) -> Vec<f64> {
    match batch.column("price") {
        Some(ColumnData::Float64(v)) => v.clone(),
        other => panic!("unexpected price column {other:?}"),
    }
}

pub fn hours(h: i64) -> Duration {
    Duration::hours(h)
}
