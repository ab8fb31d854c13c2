use super::helpers::*;
use crate::{
    splay_path, BiTimestamp, Batch, ColumnData, LocalTickstore, LocalTickstoreOptions, Tickstore,
    TickstoreError,
};
use clock::{to_nanos_saturating, ManualClock, LATEST};
use index::KeyStatus;
use splay::SplayError;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn month_of_days_then_sub_range_select() {
    let dir = tempdir().unwrap();
    let (mut store, _clock) = open_store(dir.path());

    for day in 1..=31 {
        let path = store
            .insert("BTC-USD", BiTimestamp::new(oct(day)), &day_batch(day, day as f64))
            .unwrap();
        assert_eq!(path, splay_path(dir.path(), "BTC-USD", oct(day), 0, "tick"));
        assert!(path.exists());
    }

    let start = at(10, 12);
    let end = at(24, 11);
    let out = store.select("BTC-USD", start, end, LATEST).unwrap();

    assert_eq!(out.num_rows(), 14 * 24);
    let times = out.timestamps("time").unwrap();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(times.first(), Some(&to_nanos_saturating(start)));
    assert_eq!(times.last(), Some(&to_nanos_saturating(end)));
    let p = prices(&out);
    assert!(p.iter().all(|d| (10.0..=24.0).contains(d)));
}

#[test]
fn select_of_unknown_symbol_or_empty_range_is_empty() {
    let dir = tempdir().unwrap();
    let (mut store, _clock) = open_store(dir.path());
    store
        .insert("BTC-USD", BiTimestamp::new(oct(1)), &day_batch(1, 1.0))
        .unwrap();

    let none = store.select("ETH-USD", at(1, 0), at(1, 23), LATEST).unwrap();
    assert_eq!(none.num_rows(), 0);

    let reversed = store.select("BTC-USD", at(1, 23), at(1, 0), LATEST).unwrap();
    assert_eq!(reversed.num_rows(), 0);

    let other_day = store.select("BTC-USD", at(2, 0), at(3, 0), LATEST).unwrap();
    assert_eq!(other_day.num_rows(), 0);
}

#[test]
fn as_of_sees_the_version_current_at_that_time() {
    let dir = tempdir().unwrap();
    let (mut store, clock) = open_store(dir.path());
    let ts = BiTimestamp::new(oct(5));

    let v0 = store.insert("BTC-USD", ts, &day_batch(5, 100.0)).unwrap();
    clock.advance(hours(1));
    let corrected = wall() + hours(1);
    let v1 = store.insert("BTC-USD", ts, &day_batch(5, 200.0)).unwrap();
    assert_ne!(v0, v1);
    assert!(v0.exists());

    let before = store
        .select("BTC-USD", at(5, 0), at(5, 23), corrected - hours(1))
        .unwrap();
    assert!(prices(&before).iter().all(|p| *p == 100.0));
    assert_eq!(before.num_rows(), 24);

    let after = store.select("BTC-USD", at(5, 0), at(5, 23), LATEST).unwrap();
    assert!(prices(&after).iter().all(|p| *p == 200.0));
    assert_eq!(after.num_rows(), 24);

    assert_eq!(store.index().status("BTC-USD", oct(5)), KeyStatus::Live(1));
}

#[test]
fn delete_hides_current_data_but_keeps_history() {
    let dir = tempdir().unwrap();
    let (mut store, clock) = open_store(dir.path());
    let ts = BiTimestamp::new(oct(7));
    store.insert("BTC-USD", ts, &day_batch(7, 1.0)).unwrap();

    clock.advance(hours(2));
    assert!(store.delete("BTC-USD", ts).unwrap());
    assert!(!store.delete("BTC-USD", ts).unwrap());
    assert!(!store.delete("ETH-USD", ts).unwrap());

    let now = store.select("BTC-USD", at(7, 0), at(7, 23), LATEST).unwrap();
    assert_eq!(now.num_rows(), 0);
    let earlier = store
        .select("BTC-USD", at(7, 0), at(7, 23), wall() + hours(1))
        .unwrap();
    assert_eq!(earlier.num_rows(), 24);
    assert_eq!(store.index().status("BTC-USD", oct(7)), KeyStatus::Deleted(0));
}

#[test]
fn closed_store_rejects_operations() {
    let dir = tempdir().unwrap();
    let (mut store, _clock) = open_store(dir.path());
    let ts = BiTimestamp::new(oct(1));
    store.insert("BTC-USD", ts, &day_batch(1, 1.0)).unwrap();

    store.close().unwrap();
    store.close().unwrap();
    assert!(!store.is_open());

    assert!(matches!(
        store.insert("BTC-USD", ts, &day_batch(1, 2.0)),
        Err(TickstoreError::Closed)
    ));
    assert!(matches!(store.delete("BTC-USD", ts), Err(TickstoreError::Closed)));
    assert!(matches!(
        store.select("BTC-USD", at(1, 0), at(1, 23), LATEST),
        Err(TickstoreError::Closed)
    ));
    assert!(matches!(store.flush(), Err(TickstoreError::Closed)));
    drop(store);

    let (reopened, _clock) = open_store(dir.path());
    let out = reopened.select("BTC-USD", at(1, 0), at(1, 23), LATEST).unwrap();
    assert_eq!(out.num_rows(), 24);
}

#[test]
fn destroy_removes_everything() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("ticks");
    let (mut store, _clock) = open_store(&base);
    for day in 1..=3 {
        store
            .insert("BTC-USD", BiTimestamp::new(oct(day)), &day_batch(day, 1.0))
            .unwrap();
    }
    assert!(base.join("index.tidx").exists());

    store.destroy().unwrap();
    assert!(!base.exists());
    assert!(!store.is_open());
    assert!(matches!(
        store.insert("BTC-USD", BiTimestamp::new(oct(1)), &day_batch(1, 1.0)),
        Err(TickstoreError::Closed)
    ));

    // Destroying twice is harmless and dropping does not recreate files.
    store.destroy().unwrap();
    drop(store);
    assert!(!base.exists());
}

#[test]
fn reopen_persists_state_and_drop_closes() {
    let dir = tempdir().unwrap();
    {
        let (mut store, _clock) = open_store(dir.path());
        store
            .insert("ETH-USD", BiTimestamp::new(oct(9)), &day_batch(9, 9.0))
            .unwrap();
    }
    let (store, _clock) = open_store(dir.path());
    assert_eq!(store.index().symbols(), vec!["ETH-USD"]);
    let out = store.select("ETH-USD", at(9, 0), at(9, 23), LATEST).unwrap();
    assert_eq!(out.num_rows(), 24);
}

#[test]
fn missing_index_is_rebuilt_from_splay_tree() {
    let dir = tempdir().unwrap();
    {
        let (mut store, clock) = open_store(dir.path());
        let ts = BiTimestamp::new(oct(3));
        store.insert("BTC-USD", ts, &day_batch(3, 1.0)).unwrap();
        clock.advance(hours(1));
        store.insert("BTC-USD", ts, &day_batch(3, 2.0)).unwrap();
    }
    std::fs::remove_file(dir.path().join("index.tidx")).unwrap();

    let (store, _clock) = open_store(dir.path());
    assert_eq!(store.index().status("BTC-USD", oct(3)), KeyStatus::Live(1));
    let out = store.select("BTC-USD", at(3, 0), at(3, 23), LATEST).unwrap();
    assert!(prices(&out).iter().all(|p| *p == 2.0));
}

#[test]
fn insert_requires_the_timestamp_column() {
    let dir = tempdir().unwrap();
    let (mut store, _clock) = open_store(dir.path());
    let batch = Batch::new(vec![("price", ColumnData::Float64(vec![1.0]))]).unwrap();
    let err = store
        .insert("BTC-USD", BiTimestamp::new(oct(1)), &batch)
        .unwrap_err();
    assert!(matches!(
        err,
        TickstoreError::Splay(SplayError::MissingColumn(_))
    ));
    assert!(store.index().is_empty());

    // Empty batches carry no rows to order.
    store
        .insert("BTC-USD", BiTimestamp::new(oct(1)), &Batch::empty())
        .unwrap();
    let out = store.select("BTC-USD", at(1, 0), at(1, 23), LATEST).unwrap();
    assert_eq!(out.num_rows(), 0);
}

#[test]
fn symbols_that_escape_the_tree_are_rejected() {
    let dir = tempdir().unwrap();
    let (mut store, _clock) = open_store(dir.path());
    for bad in ["", "../x", "a/b", ".hidden"] {
        let err = store
            .insert(bad, BiTimestamp::new(oct(1)), &day_batch(1, 1.0))
            .unwrap_err();
        assert!(matches!(err, TickstoreError::InvalidSymbol(_)), "{bad:?}");
    }
}

#[test]
fn orphaned_file_at_next_version_is_replaced() {
    let dir = tempdir().unwrap();
    let (mut store, _clock) = open_store(dir.path());
    let orphan = splay_path(dir.path(), "BTC-USD", oct(2), 0, "tick");
    std::fs::create_dir_all(orphan.parent().unwrap()).unwrap();
    std::fs::write(&orphan, b"half written").unwrap();

    let path = store
        .insert("BTC-USD", BiTimestamp::new(oct(2)), &day_batch(2, 5.0))
        .unwrap();
    assert_eq!(path, orphan);
    let out = store.select("BTC-USD", at(2, 0), at(2, 23), LATEST).unwrap();
    assert_eq!(out.num_rows(), 24);
}

#[test]
fn custom_options_shape_paths_and_columns() {
    let dir = tempdir().unwrap();
    let options = LocalTickstoreOptions {
        timestamp_column: "ts".into(),
        extension: "spl".into(),
        compression_level: 1,
    };
    let mut store =
        LocalTickstore::open(dir.path(), options, Arc::new(ManualClock::new(wall()))).unwrap();
    let batch = Batch::new(vec![(
        "ts",
        ColumnData::Timestamp(vec![to_nanos_saturating(at(4, 2))]),
    )])
    .unwrap();
    let path = store
        .insert("SOL-USD", BiTimestamp::new(oct(4)), &batch)
        .unwrap();
    assert!(path.ends_with("2019/10/04/SOL-USD_0000.spl"));
    assert_eq!(
        store
            .select("SOL-USD", at(4, 0), at(4, 3), LATEST)
            .unwrap()
            .num_rows(),
        1
    );
}

#[test]
fn bitimestamp_defaults_to_latest() {
    let ts = BiTimestamp::new(oct(1));
    assert!(ts.is_latest());
    let moved = ts.with_as_of(wall());
    assert_eq!(moved.as_at, oct(1));
    assert_eq!(moved.as_of, wall());
    assert!(!moved.is_latest());
}
