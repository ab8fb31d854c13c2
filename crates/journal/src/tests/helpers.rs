use crate::*;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clock::ManualClock;
use std::path::Path;
use std::sync::Arc;

pub fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn open_journal(dir: &Path, capacity: usize, schema: TickSchema) -> (Journal, ManualClock) {
    let clock = ManualClock::new(noon(2019, 10, 1));
    let journal = Journal::with_options(
        dir,
        JournalOptions { capacity, schema },
        Arc::new(clock.clone()),
    )
    .unwrap();
    (journal, clock)
}

pub fn tick(seq: i64, product: &str) -> Tick {
    Tick {
        timestamp: Some(1_569_931_200.0 + seq as f64),
        sequence: seq,
        trade_id: 1000 + seq,
        product: product.to_string(),
        side: if seq % 2 == 0 { Side::Buy } else { Side::Sell },
        size: 0.25 * seq as f64,
        price: 8300.0 + seq as f64,
    }
}

pub fn replay_day(journal: &Journal, day: NaiveDate) -> Vec<Tick> {
    let mut reader = journal.create_reader(day).unwrap();
    let mut ticks = Vec::new();
    reader.replay(|t| ticks.push(t)).unwrap();
    ticks
}
