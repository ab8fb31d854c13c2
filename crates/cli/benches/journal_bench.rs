use chrono::{TimeZone, Utc};
use clock::ManualClock;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use journal::{Journal, JournalOptions, Side, Tick, TickSchema};
use std::sync::Arc;
use tempfile::tempdir;

const N_TICKS: i64 = 10_000;
const CAPACITY: usize = 4 * 1024 * 1024;

fn tick(seq: i64) -> Tick {
    Tick {
        timestamp: Some(1_569_931_200.0 + seq as f64 * 0.001),
        sequence: seq,
        trade_id: seq,
        product: if seq % 2 == 0 { "BTC-USD" } else { "ETH-USD" }.to_string(),
        side: if seq % 3 == 0 { Side::Sell } else { Side::Buy },
        size: 0.01 * (seq % 100) as f64,
        price: 8300.0 + (seq % 50) as f64,
    }
}

fn open_journal(dir: &std::path::Path) -> Journal {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2019, 10, 1, 12, 0, 0).unwrap());
    Journal::with_options(
        dir,
        JournalOptions {
            capacity: CAPACITY,
            schema: TickSchema::WithTimestamp,
        },
        Arc::new(clock),
    )
    .unwrap()
}

fn journal_append_benchmark(c: &mut Criterion) {
    let ticks: Vec<Tick> = (0..N_TICKS).map(tick).collect();
    c.bench_function("journal_append_10k_ticks", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let journal = open_journal(dir.path());
                (dir, journal)
            },
            |(_dir, journal)| {
                let mut appender = journal.create_appender();
                for t in &ticks {
                    appender.append_tick(t).unwrap();
                }
                appender.close().unwrap();
            },
            BatchSize::PerIteration,
        );
    });
}

fn journal_replay_benchmark(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let journal = open_journal(dir.path());
    {
        let mut appender = journal.create_appender();
        for seq in 0..N_TICKS {
            appender.append_tick(&tick(seq)).unwrap();
        }
        appender.close().unwrap();
    }
    let day = Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap().date_naive();

    c.bench_function("journal_replay_10k_ticks", |b| {
        b.iter(|| {
            let mut reader = journal.create_reader(day).unwrap();
            let n = reader.replay(|_| {}).unwrap();
            assert_eq!(n, N_TICKS as usize);
        });
    });
}

criterion_group!(benches, journal_append_benchmark, journal_replay_benchmark);
criterion_main!(benches);
