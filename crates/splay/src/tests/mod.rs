mod batch_tests;

use crate::{Batch, ColumnData};

/// Three-column tick batch with the given timestamps.
pub(crate) fn ticks(times: &[i64]) -> Batch {
    let n = times.len();
    Batch::new(vec![
        ("time", ColumnData::Timestamp(times.to_vec())),
        ("sequence", ColumnData::Int64((0..n as i64).collect())),
        ("product", ColumnData::Utf8(vec!["BTC-USD".to_string(); n])),
    ])
    .unwrap()
}
