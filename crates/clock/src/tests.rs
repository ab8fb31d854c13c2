use super::*;
use chrono::TimeZone;

#[test]
fn manual_clock_clones_share_time() {
    let start = Utc.with_ymd_and_hms(2019, 10, 1, 23, 59, 0).unwrap();
    let clock = ManualClock::new(start);
    let handle = clock.clone();

    handle.advance(Duration::minutes(2));
    assert_eq!(clock.now(), start + Duration::minutes(2));
    assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2019, 10, 2).unwrap());
}

#[test]
fn sentinels_saturate() {
    assert_eq!(to_nanos_saturating(EARLIEST), i64::MIN);
    assert_eq!(to_nanos_saturating(LATEST), i64::MAX);
    let t = Utc.timestamp_opt(1, 5).unwrap();
    assert_eq!(to_nanos_saturating(t), 1_000_000_005);
}
