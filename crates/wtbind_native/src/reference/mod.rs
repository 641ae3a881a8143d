//! In-process reference engine.
//!
//! Implements the native handle traits with the engine's observable
//! semantics: configuration validation, snapshot-isolated transactions with
//! write-write conflict detection, cursor positioning rules, and the same
//! result codes for the same conditions. Committed rows are checkpointed to
//! the home directory on close and on log flush.
//!
//! ## Example
//!
//! ```rust
//! use wtbind_native::{NativeEngine, ReferenceEngine};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut conn = ReferenceEngine.open(dir.path(), Some("create")).unwrap();
//! let mut session = conn.open_session(None).unwrap();
//! assert_eq!(session.create("table:t", None), 0);
//! assert_eq!(session.close(), 0);
//! assert_eq!(conn.close(None), 0);
//! ```

mod connection;
mod cursor;
mod home;
mod session;
mod store;

use crate::backend::{NativeConnection, NativeEngine};
use crate::codes::{EINVAL, WT_PANIC};
use crate::error::{GrammarError, HomeError};
use crate::grammar::ParsedConfig;
use home::{Checkpoint, Home};
use parking_lot::{Mutex, RwLock};
use std::ffi::c_int;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use store::Store;

use connection::RefConnection;

const OPEN_KEYS: &[&str] = &[
    "cache_size",
    "create",
    "error_prefix",
    "in_memory",
    "log",
    "salvage",
    "session_max",
    "statistics",
    "statistics_log",
    "transaction_sync",
];
const LOG_KEYS: &[&str] = &[
    "archive",
    "compressor",
    "enabled",
    "file_max",
    "path",
    "prealloc",
    "recover",
    "remove",
    "zero_fill",
];
const STATISTICS_KEYS: &[&str] = &["all", "cache_walk", "clear", "fast", "none", "tree_walk"];
const STATISTICS_LOG_KEYS: &[&str] = &["json", "on_close", "path", "sources", "timestamp", "wait"];
const TRANSACTION_SYNC_KEYS: &[&str] = &["enabled", "method"];

/// Block compressors a table or the log may name.
pub(crate) const COMPRESSORS: &[&str] = &["none", "lz4", "snappy", "zlib", "zstd"];

const DEFAULT_SESSION_MAX: usize = 100;

/// The bundled engine. Stateless; every [`NativeEngine::open`] call yields an
/// independent connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEngine;

/// State shared by a connection and everything derived from it.
pub(crate) struct Shared {
    pub store: RwLock<Store>,
    home: Mutex<Option<Home>>,
    pub log_enabled: bool,
    sessions: AtomicUsize,
    session_max: usize,
    panicked: AtomicBool,
}

impl Shared {
    /// Writes committed rows to the home. A failed write leaves the engine
    /// in a state it cannot vouch for, so it panics.
    pub fn checkpoint(&self) -> c_int {
        let home = self.home.lock();
        let Some(home) = home.as_ref() else {
            return 0;
        };
        let tables = self.store.read().checkpoint();
        match home.save(&Checkpoint::from_tables(tables)) {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!(error = %e, "checkpoint failed, engine panicked");
                self.panicked.store(true, Ordering::SeqCst);
                WT_PANIC
            }
        }
    }

    /// Returns `WT_PANIC` once the engine has panicked.
    pub fn check_panic(&self) -> c_int {
        if self.panicked.load(Ordering::SeqCst) {
            WT_PANIC
        } else {
            0
        }
    }

    fn release_home(&self) {
        self.home.lock().take();
    }
}

/// Logs a configuration rejection and returns its code.
pub(crate) fn rejected(e: GrammarError) -> c_int {
    tracing::debug!(error = %e, "configuration rejected");
    e.code()
}

/// Lifts a result code into a `Result`.
pub(crate) fn ok(rc: c_int) -> Result<(), c_int> {
    match rc {
        0 => Ok(()),
        rc => Err(rc),
    }
}

/// Lowers a `Result` back to a result code.
pub(crate) fn code(result: Result<(), c_int>) -> c_int {
    result.err().unwrap_or(0)
}

fn home_failed(e: HomeError) -> c_int {
    tracing::debug!(error = %e, "cannot open home");
    e.code()
}

/// Validates the keys of a nested list, if present.
fn check_nested(config: &ParsedConfig, key: &str, allowed: &[&str]) -> Result<Option<ParsedConfig>, c_int> {
    let nested = config.get_nested(key).map_err(rejected)?;
    if let Some(nested) = &nested {
        nested.check_allowed(allowed).map_err(rejected)?;
    }
    Ok(nested)
}

fn positive(config: &ParsedConfig, key: &str) -> Result<Option<usize>, c_int> {
    match config.get_int(key).map_err(rejected)? {
        None => Ok(None),
        Some(n) if n > 0 => Ok(usize::try_from(n).ok()),
        Some(_) => Err(rejected(GrammarError::invalid_value(key, "must be positive"))),
    }
}

// SAFETY: connections opened here only hand out `RefConnection`s.
unsafe impl NativeEngine for ReferenceEngine {
    fn open(&self, path: &Path, config: Option<&str>) -> Result<Box<dyn NativeConnection>, c_int> {
        let config = ParsedConfig::parse(config).map_err(rejected)?;
        config.check_allowed(OPEN_KEYS).map_err(rejected)?;

        let create = config.get_bool("create").map_err(rejected)?.unwrap_or(false);
        let in_memory = config.get_bool("in_memory").map_err(rejected)?.unwrap_or(false);
        let salvage = config.get_bool("salvage").map_err(rejected)?.unwrap_or(false);
        let cache_size = positive(&config, "cache_size")?;
        let session_max = positive(&config, "session_max")?.unwrap_or(DEFAULT_SESSION_MAX);

        let log_enabled = match check_nested(&config, "log", LOG_KEYS)? {
            Some(log) => {
                if let Some(compressor) = log.get_str("compressor").map_err(rejected)? {
                    if !COMPRESSORS.contains(&compressor) {
                        return Err(EINVAL);
                    }
                }
                log.get_bool("enabled").map_err(rejected)?.unwrap_or(false)
            }
            None => false,
        };
        check_nested(&config, "statistics", STATISTICS_KEYS)?;
        check_nested(&config, "statistics_log", STATISTICS_LOG_KEYS)?;
        check_nested(&config, "transaction_sync", TRANSACTION_SYNC_KEYS)?;

        let (home, store) = if in_memory {
            (None, Store::new(cache_size))
        } else {
            let home = Home::open(path, create).map_err(home_failed)?;
            let checkpoint = match home.load() {
                Ok(checkpoint) => checkpoint,
                Err(HomeError::Corrupted(reason)) if salvage => {
                    tracing::warn!(%reason, home = %path.display(), "salvaging corrupt checkpoint");
                    home.quarantine().map_err(home_failed)?;
                    Checkpoint::default()
                }
                Err(e) => return Err(home_failed(e)),
            };
            (Some(home), Store::restore(None, checkpoint.into_tables()))
        };

        tracing::debug!(home = %path.display(), in_memory, log_enabled, "reference engine opened");
        let shared = Arc::new(Shared {
            store: RwLock::new(store),
            home: Mutex::new(home),
            log_enabled,
            sessions: AtomicUsize::new(0),
            session_max,
            panicked: AtomicBool::new(false),
        });
        Ok(Box::new(RefConnection::new(shared)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Item, NativeCursor, NativeSession};
    use crate::codes::{
        EBUSY, EEXIST, ENOENT, ENOTSUP, WT_CACHE_FULL, WT_DUPLICATE_KEY, WT_NOTFOUND, WT_ROLLBACK,
        WT_TRY_SALVAGE,
    };
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Box<dyn NativeConnection> {
        ReferenceEngine
            .open(dir.path(), Some("create,log=(enabled)"))
            .unwrap()
    }

    fn put(cursor: &mut dyn NativeCursor, key: &[u8], value: &[u8]) {
        cursor.set_key(key);
        cursor.set_value(value);
        assert_eq!(cursor.insert(), 0);
    }

    fn key_of(cursor: &dyn NativeCursor) -> Vec<u8> {
        let mut item = Item::empty();
        assert_eq!(cursor.get_key(&mut item), 0);
        if item.size == 0 {
            return Vec::new();
        }
        // SAFETY: the cursor lends its position buffer until the next call.
        unsafe { std::slice::from_raw_parts(item.data, item.size) }.to_vec()
    }

    #[test]
    fn open_requires_create_then_reopens() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ReferenceEngine.open(dir.path(), None).err(), Some(ENOENT));

        let mut conn = open(&dir);
        assert_eq!(ReferenceEngine.open(dir.path(), Some("create")).err(), Some(EBUSY));
        assert_eq!(conn.close(None), 0);

        let mut conn = ReferenceEngine.open(dir.path(), None).unwrap();
        assert_eq!(conn.close(None), 0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            ReferenceEngine.open(dir.path(), Some("create,bogus=1")).err(),
            Some(EINVAL)
        );
        assert_eq!(
            ReferenceEngine.open(dir.path(), Some("create,log=(enabled,compressor=lzma)")).err(),
            Some(EINVAL)
        );
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut conn = open(&dir);
            let mut session = conn.open_session(None).unwrap();
            assert_eq!(session.create("table:t", Some("key_format=u,value_format=u")), 0);
            let mut cursor = session.open_cursor("table:t", None).unwrap();
            put(&mut *cursor, b"k", b"v");
            assert_eq!(cursor.close(), 0);
            assert_eq!(session.close(), 0);
            assert_eq!(conn.close(None), 0);
        }
        let mut conn = ReferenceEngine.open(dir.path(), None).unwrap();
        let mut session = conn.open_session(None).unwrap();
        let mut cursor = session.open_cursor("table:t", Some("readonly")).unwrap();
        cursor.set_key(b"k");
        assert_eq!(cursor.search(), 0);
        assert_eq!(cursor.close(), 0);
        assert_eq!(session.close(), 0);
        assert_eq!(conn.close(None), 0);
    }

    #[test]
    fn corrupt_home_needs_salvage() {
        let dir = TempDir::new().unwrap();
        let mut conn = open(&dir);
        assert_eq!(conn.close(None), 0);
        std::fs::write(dir.path().join("WTREF.meta"), b"garbage").unwrap();

        assert_eq!(ReferenceEngine.open(dir.path(), None).err(), Some(WT_TRY_SALVAGE));
        let mut conn = ReferenceEngine.open(dir.path(), Some("salvage=true")).unwrap();
        assert_eq!(conn.close(None), 0);
    }

    #[test]
    fn handles_close_in_order() {
        let dir = TempDir::new().unwrap();
        let mut conn = open(&dir);
        let mut session = conn.open_session(None).unwrap();
        assert_eq!(session.create("table:t", None), 0);
        assert_eq!(session.create("table:t", None), EEXIST);
        assert_eq!(session.create("table:t", Some("exclusive=false")), 0);

        let mut cursor = session.open_cursor("table:t", None).unwrap();
        assert_eq!(session.drop_source("table:t", None), EBUSY);
        assert_eq!(session.close(), EBUSY);
        assert_eq!(conn.close(None), EBUSY);

        assert_eq!(cursor.close(), 0);
        assert_eq!(session.drop_source("table:t", None), 0);
        assert_eq!(session.drop_source("table:t", None), ENOENT);
        assert_eq!(session.drop_source("table:t", Some("force")), 0);
        assert_eq!(session.close(), 0);
        assert_eq!(conn.close(None), 0);
        assert_eq!(conn.close(None), EINVAL);
    }

    #[test]
    fn cursor_positioning() {
        let dir = TempDir::new().unwrap();
        let conn = open(&dir);
        let session = conn.open_session(None).unwrap();
        session.create("table:t", None);
        let mut cursor = session.open_cursor("table:t", Some("raw")).unwrap();
        put(&mut *cursor, b"a", b"1");
        put(&mut *cursor, b"c", b"3");

        let mut item = Item::empty();
        assert_eq!(cursor.get_key(&mut item), EINVAL);

        let mut exact = 99;
        cursor.set_key(b"b");
        assert_eq!(cursor.search_near(&mut exact), 0);
        assert_eq!(exact, -1);
        assert_eq!(key_of(&*cursor), b"a");

        cursor.set_key(b"0");
        assert_eq!(cursor.search_near(&mut exact), 0);
        assert_eq!(exact, 1);
        assert_eq!(key_of(&*cursor), b"a");

        assert_eq!(cursor.next(), 0);
        assert_eq!(key_of(&*cursor), b"c");
        assert_eq!(cursor.next(), WT_NOTFOUND);
        assert_eq!(cursor.get_key(&mut item), EINVAL);
        assert_eq!(cursor.prev(), 0);
        assert_eq!(key_of(&*cursor), b"c");

        cursor.set_key(b"zz");
        assert_eq!(cursor.search(), WT_NOTFOUND);
    }

    #[test]
    fn mutation_rules() {
        let dir = TempDir::new().unwrap();
        let conn = open(&dir);
        let session = conn.open_session(None).unwrap();
        session.create("table:t", None);

        let mut strict = session.open_cursor("table:t", Some("overwrite=false")).unwrap();
        put(&mut *strict, b"k", b"v");
        strict.set_key(b"k");
        strict.set_value(b"w");
        assert_eq!(strict.insert(), WT_DUPLICATE_KEY);
        strict.set_key(b"missing");
        strict.set_value(b"w");
        assert_eq!(strict.update(), WT_NOTFOUND);
        strict.set_key(b"missing");
        assert_eq!(strict.remove(), WT_NOTFOUND);

        strict.set_key(b"k");
        strict.set_value(b"");
        assert_eq!(strict.update(), 0);
        let mut item = Item::empty();
        assert_eq!(strict.get_value(&mut item), 0);
        assert_eq!(item.size, 0);
        assert!(item.data.is_null());

        let mut reader = session.open_cursor("table:t", Some("readonly")).unwrap();
        reader.set_key(b"x");
        reader.set_value(b"y");
        assert_eq!(reader.insert(), ENOTSUP);
    }

    #[test]
    fn bulk_needs_empty_table_and_sorted_keys() {
        let dir = TempDir::new().unwrap();
        let conn = open(&dir);
        let session = conn.open_session(None).unwrap();
        session.create("table:t", None);
        let mut bulk = session.open_cursor("table:t", Some("bulk")).unwrap();
        put(&mut *bulk, b"a", b"1");
        bulk.set_key(b"a");
        bulk.set_value(b"2");
        assert_eq!(bulk.insert(), EINVAL);
        assert_eq!(bulk.close(), 0);

        assert_eq!(session.open_cursor("table:t", Some("bulk")).err(), Some(EINVAL));
    }

    #[test]
    fn string_format_rejects_nul() {
        let dir = TempDir::new().unwrap();
        let conn = open(&dir);
        let session = conn.open_session(None).unwrap();
        assert_eq!(session.create("table:s", Some("key_format=S,value_format=S")), 0);
        assert_eq!(session.create("table:r", Some("key_format=r")), ENOTSUP);

        let mut cursor = session.open_cursor("table:s", None).unwrap();
        cursor.set_key(b"a\0b");
        cursor.set_value(b"v");
        assert_eq!(cursor.insert(), EINVAL);

        let mut raw = session.open_cursor("table:s", Some("raw")).unwrap();
        put(&mut *raw, b"a\0b", b"v");
    }

    #[test]
    fn transactions() {
        let dir = TempDir::new().unwrap();
        let conn = open(&dir);
        let writer = conn.open_session(None).unwrap();
        let reader = conn.open_session(None).unwrap();
        writer.create("table:t", None);

        assert_eq!(writer.commit_transaction(None), EINVAL);
        assert_eq!(writer.begin_transaction(None), 0);
        assert_eq!(writer.begin_transaction(None), EINVAL);

        let mut w = writer.open_cursor("table:t", None).unwrap();
        let mut r = reader.open_cursor("table:t", None).unwrap();
        put(&mut *w, b"k", b"v");

        r.set_key(b"k");
        assert_eq!(r.search(), WT_NOTFOUND);
        r.set_key(b"k");
        r.set_value(b"other");
        assert_eq!(r.insert(), WT_ROLLBACK);

        assert_eq!(writer.commit_transaction(None), 0);
        r.set_key(b"k");
        assert_eq!(r.search(), 0);
    }

    #[test]
    fn conflicting_transaction_cannot_commit() {
        let dir = TempDir::new().unwrap();
        let conn = open(&dir);
        let a = conn.open_session(None).unwrap();
        let b = conn.open_session(None).unwrap();
        a.create("table:t", None);
        let mut ca = a.open_cursor("table:t", None).unwrap();
        let mut cb = b.open_cursor("table:t", None).unwrap();

        assert_eq!(a.begin_transaction(None), 0);
        assert_eq!(b.begin_transaction(None), 0);
        put(&mut *ca, b"k", b"a");
        cb.set_key(b"k");
        cb.set_value(b"b");
        assert_eq!(cb.insert(), WT_ROLLBACK);
        assert_eq!(b.commit_transaction(None), WT_ROLLBACK);
        assert_eq!(a.commit_transaction(None), 0);
    }

    #[test]
    fn cache_full_in_memory() {
        let dir = TempDir::new().unwrap();
        let conn = ReferenceEngine
            .open(dir.path(), Some("in_memory,cache_size=16"))
            .unwrap();
        let session = conn.open_session(None).unwrap();
        session.create("table:t", None);
        let mut cursor = session.open_cursor("table:t", None).unwrap();
        put(&mut *cursor, b"k", b"0123456789");
        cursor.set_key(b"j");
        cursor.set_value(b"0123456789");
        assert_eq!(cursor.insert(), WT_CACHE_FULL);
        assert!(!dir.path().join("WTREF.meta").exists());
    }

    #[test]
    fn log_flush_needs_log() {
        let dir = TempDir::new().unwrap();
        let conn = ReferenceEngine.open(dir.path(), Some("create")).unwrap();
        let session = conn.open_session(None).unwrap();
        assert_eq!(session.log_flush(Some("sync=on")), EINVAL);

        let dir = TempDir::new().unwrap();
        let conn = open(&dir);
        let session = conn.open_session(None).unwrap();
        assert_eq!(session.log_flush(Some("sync=off")), 0);
        assert_eq!(session.log_flush(Some("sync=background")), 0);
        assert_eq!(session.log_flush(Some("sync=sometimes")), EINVAL);
    }

    #[test]
    fn handles_close_after_panic() {
        let dir = TempDir::new().unwrap();
        let mut conn = open(&dir);
        let mut session = conn.open_session(None).unwrap();

        // A directory where the checkpoint's temp file goes makes saving fail.
        std::fs::create_dir(dir.path().join("WTREF.meta.tmp")).unwrap();
        assert_eq!(session.log_flush(Some("sync=on")), WT_PANIC);
        assert_eq!(session.create("table:t", None), WT_PANIC);
        assert_eq!(conn.open_session(None).err(), Some(WT_PANIC));

        assert_eq!(session.close(), 0);
        assert_eq!(session.close(), EINVAL);

        // Even with the home writable again, close does not checkpoint.
        std::fs::remove_dir(dir.path().join("WTREF.meta.tmp")).unwrap();
        assert_eq!(conn.close(None), WT_PANIC);
        assert_eq!(conn.close(None), EINVAL);

        let mut conn = ReferenceEngine.open(dir.path(), None).unwrap();
        assert_eq!(conn.close(None), 0);
    }

    #[test]
    fn session_limit() {
        let dir = TempDir::new().unwrap();
        let conn = ReferenceEngine
            .open(dir.path(), Some("create,session_max=1"))
            .unwrap();
        let _first = conn.open_session(None).unwrap();
        assert_eq!(conn.open_session(None).err(), Some(crate::codes::ENOMEM));
    }
}
