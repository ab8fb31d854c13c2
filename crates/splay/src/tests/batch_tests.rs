use super::ticks;
use crate::{Batch, ColumnData, DataType, SplayError};

#[test]
fn new_rejects_ragged_and_duplicate_columns() {
    let err = Batch::new(vec![
        ("a", ColumnData::Int64(vec![1, 2])),
        ("b", ColumnData::Float64(vec![1.0])),
    ])
    .unwrap_err();
    assert!(matches!(
        err,
        SplayError::LengthMismatch { expected: 2, actual: 1, .. }
    ));

    let err = Batch::new(vec![
        ("a", ColumnData::Int64(vec![1])),
        ("a", ColumnData::Int64(vec![2])),
    ])
    .unwrap_err();
    assert!(matches!(err, SplayError::DuplicateColumn(name) if name == "a"));
}

#[test]
fn empty_batch_has_no_rows_or_columns() {
    let b = Batch::empty();
    assert_eq!(b.num_rows(), 0);
    assert_eq!(b.num_columns(), 0);
    assert!(b.is_empty());
    assert!(b.column("time").is_none());
}

#[test]
fn schema_lists_names_and_types_in_order() {
    let b = ticks(&[1, 2]);
    assert_eq!(
        b.schema(),
        vec![
            ("time", DataType::Timestamp),
            ("sequence", DataType::Int64),
            ("product", DataType::Utf8),
        ]
    );
}

#[test]
fn concat_stacks_rows_and_skips_empty_batches() {
    let a = ticks(&[1, 2]);
    let b = ticks(&[3]);
    let out = Batch::concat(&[Batch::empty(), a, Batch::empty(), b]).unwrap();
    assert_eq!(out.num_rows(), 3);
    assert_eq!(out.timestamps("time").unwrap(), &[1, 2, 3]);
    assert_eq!(
        out.column("sequence"),
        Some(&ColumnData::Int64(vec![0, 1, 0]))
    );

    assert_eq!(Batch::concat(&[]).unwrap(), Batch::empty());
}

#[test]
fn concat_rejects_mismatched_schemas() {
    let a = ticks(&[1]);
    let b = Batch::new(vec![("time", ColumnData::Int64(vec![2]))]).unwrap();
    let err = Batch::concat(&[a, b]).unwrap_err();
    assert!(matches!(err, SplayError::SchemaMismatch { .. }));
}

#[test]
fn filter_time_range_is_inclusive() {
    let b = ticks(&[10, 20, 30, 40]);
    let out = b.filter_time_range("time", 20, 30).unwrap();
    assert_eq!(out.timestamps("time").unwrap(), &[20, 30]);
    assert_eq!(out.column("sequence"), Some(&ColumnData::Int64(vec![1, 2])));

    assert_eq!(b.filter_time_range("time", 41, 50).unwrap().num_rows(), 0);
}

#[test]
fn sort_by_time_is_stable() {
    let b = ticks(&[30, 10, 20, 10]);
    let out = b.sort_by_time("time").unwrap();
    assert_eq!(out.timestamps("time").unwrap(), &[10, 10, 20, 30]);
    assert_eq!(
        out.column("sequence"),
        Some(&ColumnData::Int64(vec![1, 3, 2, 0]))
    );
}

#[test]
fn time_operations_check_the_column() {
    let b = ticks(&[1]);
    assert!(matches!(
        b.sort_by_time("missing").unwrap_err(),
        SplayError::MissingColumn(_)
    ));
    assert!(matches!(
        b.filter_time_range("sequence", 0, 1).unwrap_err(),
        SplayError::ColumnType { expected: DataType::Timestamp, actual: DataType::Int64, .. }
    ));
    // No rows, nothing to check.
    assert!(Batch::empty().sort_by_time("missing").is_ok());
}

#[test]
fn take_gathers_every_column() {
    let b = ticks(&[5, 6, 7]);
    let out = b.take(&[2, 0]);
    assert_eq!(out.timestamps("time").unwrap(), &[7, 5]);
    assert_eq!(out.num_columns(), 3);
}
