//! End-to-end scenarios against the reference engine.

use wtbind::{
    codes, ConnectionConfig, CreateConfig, CursorConfig, DropConfig, ErrorKind, NearMatch, Tri,
};
use wtbind_testkit::prelude::*;

const TABLE: &str = "table:scenario";

#[test]
fn uncommitted_writes_are_invisible_to_other_sessions() {
    init_tracing();
    let home = TestHome::new();
    let a = home.open_session(None).unwrap();
    let b = home.open_session(None).unwrap();
    a.create(TABLE, None).unwrap();

    a.begin_transaction(None).unwrap();
    let mut writer = a.mutate(TABLE, None).unwrap();
    writer.insert(b"k1", b"v1").unwrap();

    let mut reader = b.scan(TABLE, None).unwrap();
    let err = reader.read_value(b"k1").unwrap_err();
    assert!(err.is_not_found());

    a.commit_transaction(None).unwrap();
    assert_eq!(reader.read_value(b"k1").unwrap(), b"v1");
}

#[test]
fn drop_is_busy_while_a_cursor_is_open() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();

    let scanner = session.scan(TABLE, None).unwrap();
    let err = session.drop_source(TABLE, None).unwrap_err();
    assert!(err.is_busy(), "unexpected error: {err}");
    assert_eq!(err.code(), codes::EBUSY);

    scanner.close().unwrap();
    session.drop_source(TABLE, None).unwrap();
    assert!(session.scan(TABLE, None).is_err());
}

#[test]
fn drop_of_missing_table() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    let err = session.drop_source("table:ghost", None).unwrap_err();
    assert_eq!(err.code(), codes::ENOENT);

    let force = DropConfig {
        force: Tri::True,
        ..Default::default()
    };
    session.drop_source("table:ghost", Some(&force)).unwrap();
}

#[test]
fn search_near_prefers_the_smaller_key() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
    let mut mutator = session.mutate(TABLE, None).unwrap();
    mutator.insert(b"a", b"1").unwrap();
    mutator.insert(b"c", b"3").unwrap();

    let mut scanner = session.scan(TABLE, None).unwrap();
    assert_eq!(scanner.search_near(b"b").unwrap(), NearMatch::Smaller);
    assert_eq!(scanner.key().unwrap(), b"a");

    assert_eq!(scanner.search_near(b"c").unwrap(), NearMatch::Exact);
    assert_eq!(scanner.value_view().unwrap(), *b"3");

    assert_eq!(scanner.search_near(b"0").unwrap(), NearMatch::Larger);
    assert_eq!(scanner.key().unwrap(), b"a");
}

#[test]
fn search_near_on_empty_table_is_not_found() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
    let mut scanner = session.scan(TABLE, None).unwrap();
    assert!(scanner.search_near(b"x").unwrap_err().is_not_found());
}

#[test]
fn end_of_scan_matches_missing_key() {
    let home = scenarios::populated_home(TABLE, 3);
    let session = home.open_session(None).unwrap();
    let mut scanner = session.scan(TABLE, None).unwrap();

    let missing = scanner.search(b"nope").unwrap_err().kind();
    for i in 0..3 {
        scanner.next().unwrap();
        assert_eq!(scanner.key().unwrap(), scenarios::key(i));
    }
    let end = scanner.next().unwrap_err();
    assert_eq!(end.kind(), missing);
    assert_eq!(end.kind(), Some(ErrorKind::NotFound));

    // An exhausted cursor restarts from the first record.
    scanner.next().unwrap();
    assert_eq!(scanner.key().unwrap(), scenarios::key(0));
}

#[test]
fn prev_walks_backwards() {
    let home = scenarios::populated_home(TABLE, 4);
    let session = home.open_session(None).unwrap();
    let mut scanner = session.scan(TABLE, None).unwrap();
    let mut keys = Vec::new();
    while scanner.prev().is_ok() {
        keys.push(scanner.key().unwrap());
    }
    let expected: Vec<_> = (0..4).rev().map(scenarios::key).collect();
    assert_eq!(keys, expected);
}

#[test]
fn zero_length_value_reads_back_empty() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
    let mut mutator = session.mutate(TABLE, None).unwrap();
    mutator.insert(b"empty", b"").unwrap();

    let mut scanner = session.scan(TABLE, None).unwrap();
    scanner.search(b"empty").unwrap();
    let view = scanner.value_view().unwrap();
    assert!(view.is_empty());
    assert_eq!(scanner.read_value(b"empty").unwrap(), Vec::<u8>::new());
}

#[test]
fn mutations_leave_the_cursor_reusable() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
    let strict = CursorConfig::new().with_overwrite(false);
    let mut mutator = session.mutate(TABLE, Some(&strict)).unwrap();

    mutator.insert(b"k", b"1").unwrap();
    let dup = mutator.insert(b"k", b"2").unwrap_err();
    assert!(dup.is_duplicate_key());

    mutator.update(b"k", b"3").unwrap();
    assert!(mutator.update(b"missing", b"x").unwrap_err().is_not_found());
    assert!(mutator.remove(b"missing").unwrap_err().is_not_found());

    // Still usable after every failure above.
    mutator.insert(b"k2", b"4").unwrap();
    mutator.remove(b"k").unwrap();

    let mut scanner = session.scan(TABLE, None).unwrap();
    assert!(scanner.read_value(b"k").unwrap_err().is_not_found());
    assert_eq!(scanner.read_value(b"k2").unwrap(), b"4");
}

#[test]
fn scanner_is_forced_read_only() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
    let writable = CursorConfig::new().with_readonly(false);
    let scanner = session.scan(TABLE, Some(&writable)).unwrap();
    scanner.close().unwrap();

    let mut cursor = session.open_cursor(TABLE, Some(&writable)).unwrap();
    cursor.insert(b"k", b"v").unwrap();
    cursor.close().unwrap();

    let readonly = CursorConfig::new().with_readonly(true);
    let mut cursor = session.open_cursor(TABLE, Some(&readonly)).unwrap();
    assert_eq!(cursor.insert(b"k", b"v").unwrap_err().code(), codes::ENOTSUP);
}

#[test]
fn bulk_load_requires_increasing_keys() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
    let bulk = CursorConfig::new().with_bulk(true);
    let mut cursor = session.open_cursor(TABLE, Some(&bulk)).unwrap();
    cursor.insert(b"a", b"1").unwrap();
    cursor.insert(b"b", b"2").unwrap();
    assert_eq!(cursor.insert(b"a", b"3").unwrap_err().code(), codes::EINVAL);
    cursor.close().unwrap();

    let err = session.open_cursor(TABLE, Some(&bulk)).unwrap_err();
    assert_eq!(err.code(), codes::EINVAL);
}

#[test]
fn for_each_borrows_every_record() {
    let home = scenarios::populated_home(TABLE, 25);
    let session = home.open_session(None).unwrap();
    let mut scanner = session.scan(TABLE, None).unwrap();
    let mut total = 0;
    scanner
        .for_each(|key, value| {
            assert!(key.starts_with(b"key"));
            total += value.len();
            Ok(())
        })
        .unwrap();
    let expected: usize = (0..25).map(|i| scenarios::value(i).len()).sum();
    assert_eq!(total, expected);
}

#[test]
fn create_is_exclusive_unless_told_otherwise() {
    let home = TestHome::new();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
    assert_eq!(session.create(TABLE, None).unwrap_err().code(), codes::EEXIST);

    let relaxed = CreateConfig {
        exclusive: Tri::False,
        ..Default::default()
    };
    session.create(TABLE, Some(&relaxed)).unwrap();

    let lz = CreateConfig {
        block_compressor: "zstd".into(),
        ..Default::default()
    };
    session.create("table:compressed", Some(&lz)).unwrap();
    let bogus = CreateConfig {
        block_compressor: "bogus".into(),
        ..Default::default()
    };
    assert!(session.create("table:bogus", Some(&bogus)).is_err());
    assert!(session.create("file:raw", None).is_err());
}

#[test]
fn data_survives_reopen() {
    let mut home = scenarios::populated_home(TABLE, 5);
    home.reopen(None).unwrap();
    let session = home.open_session(None).unwrap();
    let mut scanner = session.scan(TABLE, None).unwrap();
    assert_eq!(scanner.read_value(&scenarios::key(4)).unwrap(), scenarios::value(4));
}

#[test]
fn first_open_needs_create() {
    let dir = tempfile::tempdir().unwrap();
    let err = wtbind::Connection::open(dir.path(), None).unwrap_err();
    assert_eq!(err.code(), codes::ENOENT);
}

#[test]
fn corrupt_home_is_salvaged() {
    let mut home = scenarios::populated_home(TABLE, 2);
    home.conn.close(None).unwrap();
    std::fs::write(home.path().join("WTREF.meta"), b"not a checkpoint").unwrap();

    let err = wtbind::Connection::open(home.path(), None).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TrySalvage));

    let salvage = ConnectionConfig {
        salvage: Tri::True,
        ..Default::default()
    };
    home.conn = wtbind::Connection::open(home.path(), Some(&salvage)).unwrap();
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
}

#[test]
fn in_memory_cache_fills_up() {
    let home = TestHome::in_memory(1024);
    let session = home.open_session(None).unwrap();
    session.create(TABLE, None).unwrap();
    let mut mutator = session.mutate(TABLE, None).unwrap();
    let value = vec![7u8; 100];

    let mut err = None;
    for i in 0..100 {
        if let Err(e) = mutator.insert(&scenarios::key(i), &value) {
            err = Some(e);
            break;
        }
    }
    let err = err.expect("cache never filled");
    assert_eq!(err.kind(), Some(ErrorKind::CacheFull));
    assert!(!err.is_retryable());
}

#[test]
fn log_flush_needs_logging() {
    let home = TestHome::with_config(ConnectionConfig::default());
    let session = home.open_session(None).unwrap();
    let err = session.log_flush(wtbind::SyncMode::On).unwrap_err();
    assert_eq!(err.code(), codes::EINVAL);
}

#[test]
fn closed_handles_fail_instead_of_crashing() {
    let mut home = TestHome::new();
    let mut session = home.open_session(None).unwrap();
    session.close().unwrap();
    assert!(matches!(
        session.scan(TABLE, None).unwrap_err(),
        wtbind::Error::Closed { .. }
    ));
    drop(session);

    home.conn.close(None).unwrap();
    assert!(home.is_closed());
    assert!(home.open_session(None).is_err());
}
