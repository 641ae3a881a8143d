//! Session handle of the reference engine.

use super::cursor::{CursorFlags, RefCursor};
use super::store::{ReadView, Store, TableConfig, Txn};
use super::{code, ok, rejected, Shared, COMPRESSORS};
use crate::backend::{NativeCursor, NativeSession};
use crate::codes::{EBUSY, EINVAL, ENOENT, ENOTSUP, WT_ROLLBACK};
use crate::error::GrammarError;
use crate::grammar::ParsedConfig;
use parking_lot::Mutex;
use std::ffi::c_int;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const CREATE_KEYS: &[&str] = &["block_compressor", "exclusive", "key_format", "value_format"];
const DROP_KEYS: &[&str] = &["force", "remove_files"];
const CURSOR_KEYS: &[&str] = &["bulk", "overwrite", "raw", "readonly"];
const FLUSH_KEYS: &[&str] = &["sync"];
const BEGIN_KEYS: &[&str] = &["isolation", "name", "priority", "sync"];
const COMMIT_KEYS: &[&str] = &["sync"];

/// Formats the reference engine stores without interpretation.
const FORMATS: &[&str] = &["u", "S"];

const TABLE_PREFIX: &str = "table:";

/// Which committed rows a read may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Isolation {
    /// Rows committed before the transaction began.
    Snapshot,
    /// Rows committed before each individual read.
    ReadCommitted,
}

pub(crate) fn parse_isolation(config: &ParsedConfig) -> Result<Option<Isolation>, c_int> {
    match config.get_str("isolation").map_err(rejected)? {
        None => Ok(None),
        Some("snapshot") => Ok(Some(Isolation::Snapshot)),
        // Dirty reads are not modelled; uncommitted rows stay private.
        Some("read-committed" | "read-uncommitted") => Ok(Some(Isolation::ReadCommitted)),
        Some(other) => Err(rejected(GrammarError::invalid_value(
            "isolation",
            format!("unknown isolation level {other:?}"),
        ))),
    }
}

/// Per-session state, shared with the session's cursors.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub isolation: Isolation,
    pub txn: Option<Txn>,
    txn_isolation: Isolation,
    cursors: usize,
}

impl SessionState {
    /// The snapshot reads and conflict checks run against.
    pub fn snapshot(&self, store: &Store) -> u64 {
        match &self.txn {
            Some(txn) if self.txn_isolation == Isolation::Snapshot => txn.snapshot,
            _ => store.committed(),
        }
    }

    pub fn view<'a>(&'a self, store: &Store, table: &str) -> ReadView<'a> {
        ReadView {
            snapshot: self.snapshot(store),
            writes: self.txn.as_ref().and_then(|txn| txn.writes.get(table)),
        }
    }

    pub fn cursor_closed(&mut self) {
        self.cursors = self.cursors.saturating_sub(1);
    }
}

pub(crate) struct RefSession {
    shared: Arc<Shared>,
    state: Arc<Mutex<SessionState>>,
    closed: bool,
}

impl RefSession {
    pub fn new(shared: Arc<Shared>, isolation: Isolation) -> Self {
        Self {
            shared,
            state: Arc::new(Mutex::new(SessionState {
                isolation,
                txn: None,
                txn_isolation: isolation,
                cursors: 0,
            })),
            closed: false,
        }
    }

    /// Fails on a closed session or a panicked engine.
    fn guard(&self) -> Result<(), c_int> {
        if self.closed {
            return Err(EINVAL);
        }
        ok(self.shared.check_panic())
    }

    fn try_create(&self, name: &str, config: Option<&str>) -> Result<(), c_int> {
        self.guard()?;
        let config = parse_with(config, CREATE_KEYS)?;
        if name.len() <= TABLE_PREFIX.len() || !name.starts_with(TABLE_PREFIX) {
            return Err(EINVAL);
        }
        let table = table_config(&config)?;
        let exclusive = flag(&config, "exclusive", true)?;
        ok(self.shared.store.write().create_table(name, table, exclusive))
    }

    fn try_drop(&self, name: &str, config: Option<&str>) -> Result<(), c_int> {
        self.guard()?;
        let config = parse_with(config, DROP_KEYS)?;
        let force = flag(&config, "force", false)?;
        // Nothing lives outside the checkpoint, so remove_files is moot.
        flag(&config, "remove_files", true)?;
        ok(self.shared.store.write().drop_table(name, force))
    }

    fn try_log_flush(&self, config: Option<&str>) -> Result<(), c_int> {
        self.guard()?;
        let config = parse_with(config, FLUSH_KEYS)?;
        let durable = match config.get_str("sync").map_err(rejected)? {
            None | Some("on" | "background") => true,
            Some("off") => false,
            Some(other) => {
                return Err(rejected(GrammarError::invalid_value(
                    "sync",
                    format!("unknown sync mode {other:?}"),
                )))
            }
        };
        if !self.shared.log_enabled {
            return Err(EINVAL);
        }
        if durable {
            ok(self.shared.checkpoint())?;
        }
        Ok(())
    }

    fn try_begin(&self, config: Option<&str>) -> Result<(), c_int> {
        self.guard()?;
        let config = parse_with(config, BEGIN_KEYS)?;
        let isolation = parse_isolation(&config)?;
        if let Some(priority) = config.get_int("priority").map_err(rejected)? {
            if !(-100..=100).contains(&priority) {
                return Err(EINVAL);
            }
        }
        config.get_str("name").map_err(rejected)?;
        flag(&config, "sync", false)?;

        let mut state = self.state.lock();
        if state.txn.is_some() {
            return Err(EINVAL);
        }
        let txn = self.shared.store.write().begin();
        tracing::trace!(txn = txn.id, snapshot = txn.snapshot, "transaction started");
        state.txn_isolation = isolation.unwrap_or(state.isolation);
        state.txn = Some(txn);
        Ok(())
    }

    fn try_commit(&self, config: Option<&str>) -> Result<(), c_int> {
        self.guard()?;
        let config = parse_with(config, COMMIT_KEYS)?;
        let sync = flag(&config, "sync", false)?;

        let txn = self.state.lock().txn.take().ok_or(EINVAL)?;
        let poisoned = txn.poisoned;
        self.shared.store.write().finish(txn, !poisoned);
        if poisoned {
            return Err(WT_ROLLBACK);
        }
        if sync && self.shared.log_enabled {
            ok(self.shared.checkpoint())?;
        }
        Ok(())
    }

    fn try_rollback(&self, config: Option<&str>) -> Result<(), c_int> {
        self.guard()?;
        parse_with(config, &[])?;
        let txn = self.state.lock().txn.take().ok_or(EINVAL)?;
        self.shared.store.write().finish(txn, false);
        Ok(())
    }
}

fn parse_with(config: Option<&str>, allowed: &[&str]) -> Result<ParsedConfig, c_int> {
    let config = ParsedConfig::parse(config).map_err(rejected)?;
    config.check_allowed(allowed).map_err(rejected)?;
    Ok(config)
}

fn flag(config: &ParsedConfig, key: &str, default: bool) -> Result<bool, c_int> {
    Ok(config.get_bool(key).map_err(rejected)?.unwrap_or(default))
}

fn table_config(config: &ParsedConfig) -> Result<TableConfig, c_int> {
    let mut table = TableConfig::default();
    for (key, slot) in [
        ("key_format", &mut table.key_format),
        ("value_format", &mut table.value_format),
    ] {
        if let Some(format) = config.get_str(key).map_err(rejected)? {
            if !FORMATS.contains(&format) {
                return Err(ENOTSUP);
            }
            *slot = format.to_string();
        }
    }
    if let Some(compressor) = config.get_str("block_compressor").map_err(rejected)? {
        if !COMPRESSORS.contains(&compressor) {
            return Err(EINVAL);
        }
        if compressor != "none" {
            table.block_compressor = Some(compressor.to_string());
        }
    }
    Ok(table)
}

// SAFETY: cursors opened here are `RefCursor`s.
unsafe impl NativeSession for RefSession {
    fn close(&mut self) -> c_int {
        // A panicked engine must still release its sessions.
        if self.closed {
            return EINVAL;
        }
        let mut state = self.state.lock();
        if state.cursors > 0 {
            return EBUSY;
        }
        if let Some(txn) = state.txn.take() {
            tracing::debug!(txn = txn.id, "rolling back transaction of closing session");
            self.shared.store.write().finish(txn, false);
        }
        drop(state);
        self.shared.sessions.fetch_sub(1, Ordering::SeqCst);
        self.closed = true;
        0
    }

    fn create(&self, name: &str, config: Option<&str>) -> c_int {
        code(self.try_create(name, config))
    }

    fn drop_source(&self, name: &str, config: Option<&str>) -> c_int {
        code(self.try_drop(name, config))
    }

    fn open_cursor(&self, uri: &str, config: Option<&str>) -> Result<Box<dyn NativeCursor>, c_int> {
        self.guard()?;
        let config = parse_with(config, CURSOR_KEYS)?;
        let raw = flag(&config, "raw", false)?;
        let mut flags = CursorFlags {
            string_key: false,
            string_value: false,
            readonly: flag(&config, "readonly", false)?,
            overwrite: flag(&config, "overwrite", true)?,
            bulk: flag(&config, "bulk", false)?,
        };
        if flags.bulk && flags.readonly {
            return Err(EINVAL);
        }

        let mut state = self.state.lock();
        let mut store = self.shared.store.write();
        let table = store.table(uri).ok_or(ENOENT)?;
        if !raw {
            flags.string_key = table.config.key_format == "S";
            flags.string_value = table.config.value_format == "S";
        }
        if flags.bulk {
            if table.cursor_count() > 0 || table.has_pending_writes() {
                return Err(EBUSY);
            }
            if !table.is_empty_at(store.committed()) {
                return Err(EINVAL);
            }
        }
        ok(store.attach_cursor(uri))?;
        state.cursors += 1;
        drop(store);
        drop(state);

        Ok(Box::new(RefCursor::new(
            Arc::clone(&self.shared),
            Arc::clone(&self.state),
            uri.to_string(),
            flags,
        )))
    }

    fn log_flush(&self, config: Option<&str>) -> c_int {
        code(self.try_log_flush(config))
    }

    fn begin_transaction(&self, config: Option<&str>) -> c_int {
        code(self.try_begin(config))
    }

    fn commit_transaction(&self, config: Option<&str>) -> c_int {
        code(self.try_commit(config))
    }

    fn rollback_transaction(&self, config: Option<&str>) -> c_int {
        code(self.try_rollback(config))
    }
}

impl Drop for RefSession {
    fn drop(&mut self) {
        if !self.closed {
            NativeSession::close(self);
        }
    }
}
