use super::helpers::*;
use crate::*;
use chrono::Duration;
use tempfile::tempdir;

#[test]
fn rollover_finalizes_previous_day_and_replays_both() {
    let dir = tempdir().unwrap();
    let (journal, clock) = open_journal(dir.path(), 4096, TickSchema::WithTimestamp);
    let mut a = journal.create_appender();

    let day1: Vec<Tick> = (1..=3).map(|i| tick(i, "BTC-USD")).collect();
    let day2: Vec<Tick> = (4..=5).map(|i| tick(i, "ETH-USD")).collect();

    for t in &day1 {
        a.append_tick(t).unwrap();
    }

    clock.advance(Duration::days(1));
    // the rollover happens on the next write, not on the clock change
    assert_eq!(a.current_date(), Some(date(2019, 10, 1)));
    a.append_tick(&day2[0]).unwrap();
    assert_eq!(a.current_date(), Some(date(2019, 10, 2)));

    let r1 = journal.create_reader(date(2019, 10, 1)).unwrap();
    assert!(r1.is_finalized(), "previous day finalized at rollover");
    let day1_bytes: usize = day1
        .iter()
        .map(|t| TickSchema::WithTimestamp.record_len(t))
        .sum();
    assert_eq!(r1.get_length() as usize, day1_bytes);

    a.append_tick(&day2[1]).unwrap();
    a.close().unwrap();

    assert_eq!(replay_day(&journal, date(2019, 10, 1)), day1);
    assert_eq!(replay_day(&journal, date(2019, 10, 2)), day2);
}

#[test]
fn rollover_resets_offset_for_new_day() {
    let dir = tempdir().unwrap();
    let (journal, clock) = open_journal(dir.path(), 64, TickSchema::WithTimestamp);
    let mut a = journal.create_appender();

    for i in 0..7 {
        a.write_long(i).unwrap();
    }
    assert!(matches!(a.write_long(7), Err(JournalError::NoSpace { .. })));

    // a full day does not block the next one
    clock.advance(Duration::hours(12));
    a.write_long(7).unwrap();
    assert_eq!(a.position(), HEADER_LEN + 8);
    a.close().unwrap();

    assert_eq!(
        journal.create_reader(date(2019, 10, 1)).unwrap().get_length(),
        56
    );
    assert_eq!(
        journal.create_reader(date(2019, 10, 2)).unwrap().get_length(),
        8
    );
}

#[test]
fn reopening_finalized_day_appends_after_existing_records() {
    let dir = tempdir().unwrap();
    let (journal, _clock) = open_journal(dir.path(), 4096, TickSchema::WithTimestamp);
    {
        let mut a = journal.create_appender();
        a.append_tick(&tick(1, "BTC-USD")).unwrap();
        a.close().unwrap();
    }
    {
        let mut a = journal.create_appender();
        a.append_tick(&tick(2, "BTC-USD")).unwrap();
        // reopened file is marked open again
        assert!(!journal.create_reader(date(2019, 10, 1)).unwrap().is_finalized());
        a.close().unwrap();
    }

    assert_eq!(
        replay_day(&journal, date(2019, 10, 1)),
        vec![tick(1, "BTC-USD"), tick(2, "BTC-USD")]
    );
}

#[test]
fn reopening_unfinalized_day_recovers_complete_ticks() {
    let dir = tempdir().unwrap();
    let (journal, _clock) = open_journal(dir.path(), 4096, TickSchema::WithTimestamp);
    {
        let mut a = journal.create_appender();
        a.append_tick(&tick(1, "BTC-USD")).unwrap();
        a.append_tick(&tick(2, "BTC-USD")).unwrap();
        a.flush().unwrap();
        // simulate a crash: the header is never finalized
        std::mem::forget(a);
    }

    let mut a = journal.create_appender();
    a.append_tick(&tick(3, "BTC-USD")).unwrap();
    a.close().unwrap();

    let ticks = replay_day(&journal, date(2019, 10, 1));
    assert_eq!(
        ticks.iter().map(|t| t.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn empty_product_rejected_so_resume_keeps_later_ticks() {
    let dir = tempdir().unwrap();
    let (journal, _clock) = open_journal(dir.path(), 4096, TickSchema::WithTimestamp);
    {
        let mut a = journal.create_appender();
        a.append_tick(&tick(1, "BTC-USD")).unwrap();
        let pos = a.position();
        assert!(matches!(
            a.append_tick(&tick(2, "")),
            Err(JournalError::EmptyProduct { sequence: 2 })
        ));
        assert_eq!(a.position(), pos, "rejected tick wrote nothing");
        a.append_tick(&tick(3, "ETH-USD")).unwrap();
        a.flush().unwrap();
        std::mem::forget(a);
    }

    let mut a = journal.create_appender();
    a.append_tick(&tick(4, "BTC-USD")).unwrap();
    a.close().unwrap();

    let ticks = replay_day(&journal, date(2019, 10, 1));
    assert_eq!(
        ticks.iter().map(|t| t.sequence).collect::<Vec<_>>(),
        vec![1, 3, 4]
    );
}

#[test]
fn last_tick_of_unfinalized_and_finalized_day() {
    let dir = tempdir().unwrap();
    let (journal, _clock) = open_journal(dir.path(), 4096, TickSchema::WithTimestamp);
    let mut a = journal.create_appender();
    a.append_tick(&tick(1, "BTC-USD")).unwrap();
    a.append_tick(&tick(2, "ETH-USD")).unwrap();
    a.flush().unwrap();

    let reader = journal.create_reader(date(2019, 10, 1)).unwrap();
    assert!(!reader.is_finalized());
    assert_eq!(reader.last_tick(), Some(tick(2, "ETH-USD")));
    assert_eq!(reader.offset(), HEADER_LEN);

    a.close().unwrap();
    let reader = journal.create_reader(date(2019, 10, 1)).unwrap();
    assert_eq!(reader.last_tick(), Some(tick(2, "ETH-USD")));
}

#[test]
fn last_tick_of_empty_day_is_none() {
    let dir = tempdir().unwrap();
    let (journal, _clock) = open_journal(dir.path(), 4096, TickSchema::WithTimestamp);
    let mut a = journal.create_appender();
    a.write_byte(0).unwrap();
    a.close().unwrap();
    // a lone zero byte is not a complete tick
    assert_eq!(journal.create_reader(date(2019, 10, 1)).unwrap().last_tick(), None);
}
