//! Cursor handle of the reference engine.
//!
//! A cursor keeps two kinds of state: the key and value staged by
//! `set_key`/`set_value` for the next operation, and a copy of the record it
//! is positioned on. Reads lend out the position buffers, which are only
//! overwritten by the next positioning call.

use super::session::SessionState;
use super::{code, ok, Shared};
use crate::backend::{Item, NativeCursor};
use crate::codes::{EINVAL, ENOTSUP, WT_DUPLICATE_KEY, WT_NOTFOUND, WT_ROLLBACK};
use parking_lot::Mutex;
use std::ffi::c_int;
use std::sync::Arc;

/// Flags fixed when the cursor is opened.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CursorFlags {
    /// Keys are NUL-terminated strings: set on non-raw cursors over an `S`
    /// key format.
    pub string_key: bool,
    /// Likewise for values.
    pub string_value: bool,
    pub readonly: bool,
    pub overwrite: bool,
    pub bulk: bool,
}

/// A staged key or value.
#[derive(Debug, Default)]
struct Staged {
    bytes: Vec<u8>,
    set: bool,
}

impl Staged {
    fn stage(&mut self, bytes: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
        self.set = true;
    }

    fn get(&self) -> Option<&[u8]> {
        self.set.then_some(self.bytes.as_slice())
    }

    fn clear(&mut self) {
        self.set = false;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum At {
    #[default]
    Nowhere,
    Record,
    /// On a key that was just removed: the key is readable, the value not.
    Removed,
}

#[derive(Debug, Default)]
struct Position {
    key: Vec<u8>,
    value: Vec<u8>,
    at: At,
}

impl Position {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.key.clear();
        self.key.extend_from_slice(key);
        self.value.clear();
        self.value.extend_from_slice(value);
        self.at = At::Record;
    }

    fn removed(&mut self, key: &[u8]) {
        self.key.clear();
        self.key.extend_from_slice(key);
        self.value.clear();
        self.at = At::Removed;
    }

    fn clear(&mut self) {
        self.at = At::Nowhere;
    }

    fn key(&self) -> Option<&[u8]> {
        (self.at != At::Nowhere).then_some(self.key.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        (self.at == At::Record).then_some(self.value.as_slice())
    }
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Insert,
    Update,
    Remove,
}

pub(crate) struct RefCursor {
    shared: Arc<Shared>,
    session: Arc<Mutex<SessionState>>,
    uri: String,
    flags: CursorFlags,
    key: Staged,
    value: Staged,
    position: Position,
    bulk_last: Option<Vec<u8>>,
    closed: bool,
}

impl RefCursor {
    pub fn new(
        shared: Arc<Shared>,
        session: Arc<Mutex<SessionState>>,
        uri: String,
        flags: CursorFlags,
    ) -> Self {
        tracing::trace!(%uri, ?flags, "cursor opened");
        Self {
            shared,
            session,
            uri,
            flags,
            key: Staged::default(),
            value: Staged::default(),
            position: Position::default(),
            bulk_last: None,
            closed: false,
        }
    }

    fn guard(&self) -> Result<(), c_int> {
        if self.closed {
            return Err(EINVAL);
        }
        ok(self.shared.check_panic())
    }

    fn clear_staged(&mut self) {
        self.key.clear();
        self.value.clear();
    }

    fn try_search(&mut self) -> Result<(), c_int> {
        self.guard()?;
        let key = self.key.get().ok_or(EINVAL)?;
        let state = self.session.lock();
        let store = self.shared.store.read();
        let view = state.view(&store, &self.uri);
        let found = match store.read(&self.uri, key, view) {
            Some(value) => {
                self.position.set(key, value);
                Ok(())
            }
            None => {
                self.position.clear();
                Err(WT_NOTFOUND)
            }
        };
        drop(store);
        drop(state);
        self.clear_staged();
        found
    }

    fn try_search_near(&mut self, exact: &mut c_int) -> Result<(), c_int> {
        self.guard()?;
        let key = self.key.get().ok_or(EINVAL)?;
        let state = self.session.lock();
        let store = self.shared.store.read();
        let view = state.view(&store, &self.uri);
        let (hit, direction) = if let Some(value) = store.read(&self.uri, key, view) {
            (Some((key, value)), 0)
        } else if let Some(smaller) = store.step(&self.uri, Some(key), false, view) {
            (Some(smaller), -1)
        } else {
            (store.step(&self.uri, Some(key), true, view), 1)
        };
        let found = match hit {
            Some((k, v)) => {
                self.position.set(k, v);
                *exact = direction;
                Ok(())
            }
            None => {
                self.position.clear();
                Err(WT_NOTFOUND)
            }
        };
        drop(store);
        drop(state);
        self.clear_staged();
        found
    }

    fn try_step(&mut self, forward: bool) -> Result<(), c_int> {
        self.guard()?;
        let state = self.session.lock();
        let store = self.shared.store.read();
        let view = state.view(&store, &self.uri);
        let found = match store.step(&self.uri, self.position.key(), forward, view) {
            Some((k, v)) => {
                self.position.set(k, v);
                Ok(())
            }
            None => {
                self.position.clear();
                Err(WT_NOTFOUND)
            }
        };
        drop(store);
        drop(state);
        self.clear_staged();
        found
    }

    /// Applies one mutation under the session's transaction, if any.
    fn apply(&self, key: &[u8], value: Option<&[u8]>, mutation: Mutation) -> Result<(), c_int> {
        if (self.flags.string_key && key.contains(&0))
            || (self.flags.string_value && value.is_some_and(|v| v.contains(&0)))
        {
            return Err(EINVAL);
        }
        let mut state = self.session.lock();
        let mut store = self.shared.store.write();
        let exists = store
            .read(&self.uri, key, state.view(&store, &self.uri))
            .is_some();
        match mutation {
            Mutation::Insert if exists && !self.flags.overwrite => return Err(WT_DUPLICATE_KEY),
            Mutation::Update if !exists && !self.flags.overwrite => return Err(WT_NOTFOUND),
            Mutation::Remove if !exists => return Err(WT_NOTFOUND),
            _ => {}
        }

        let snapshot = state.snapshot(&store);
        let rc = store.write(&self.uri, key, value, state.txn.as_mut(), snapshot);
        if rc == WT_ROLLBACK {
            if let Some(txn) = state.txn.as_mut() {
                txn.poisoned = true;
            }
        }
        ok(rc)
    }

    fn try_insert(&mut self) -> Result<(), c_int> {
        self.guard()?;
        if self.flags.readonly {
            return Err(ENOTSUP);
        }
        let key = self.key.get().ok_or(EINVAL)?;
        let value = self.value.get().ok_or(EINVAL)?;
        if self.flags.bulk && self.bulk_last.as_deref().is_some_and(|last| key <= last) {
            return Err(EINVAL);
        }
        self.apply(key, Some(value), Mutation::Insert)?;
        if self.flags.bulk {
            self.bulk_last = Some(key.to_vec());
        }
        self.position.clear();
        self.clear_staged();
        Ok(())
    }

    fn try_update(&mut self) -> Result<(), c_int> {
        self.guard()?;
        if self.flags.readonly || self.flags.bulk {
            return Err(ENOTSUP);
        }
        let key = self.key.get().ok_or(EINVAL)?;
        let value = self.value.get().ok_or(EINVAL)?;
        self.apply(key, Some(value), Mutation::Update)?;
        self.position.set(key, value);
        self.clear_staged();
        Ok(())
    }

    fn try_remove(&mut self) -> Result<(), c_int> {
        self.guard()?;
        if self.flags.readonly || self.flags.bulk {
            return Err(ENOTSUP);
        }
        let key = match self.key.get() {
            Some(key) => key.to_vec(),
            None => self.position.key().ok_or(EINVAL)?.to_vec(),
        };
        self.apply(&key, None, Mutation::Remove)?;
        self.position.removed(&key);
        self.clear_staged();
        Ok(())
    }
}

// SAFETY: items point into `self.position`, which owns its bytes and only
// changes through methods taking `&mut self`.
unsafe impl NativeCursor for RefCursor {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn close(&mut self) -> c_int {
        if self.closed {
            return EINVAL;
        }
        let mut state = self.session.lock();
        self.shared.store.write().detach_cursor(&self.uri);
        state.cursor_closed();
        drop(state);
        self.closed = true;
        0
    }

    fn reset(&mut self) -> c_int {
        if let Err(rc) = self.guard() {
            return rc;
        }
        self.position.clear();
        self.clear_staged();
        0
    }

    fn set_key(&mut self, key: &[u8]) {
        self.key.stage(key);
    }

    fn set_value(&mut self, value: &[u8]) {
        self.value.stage(value);
    }

    fn get_key(&self, item: &mut Item) -> c_int {
        code(self.guard().and_then(|()| {
            *item = Item::from_slice(self.position.key().ok_or(EINVAL)?);
            Ok(())
        }))
    }

    fn get_value(&self, item: &mut Item) -> c_int {
        code(self.guard().and_then(|()| {
            *item = Item::from_slice(self.position.value().ok_or(EINVAL)?);
            Ok(())
        }))
    }

    fn next(&mut self) -> c_int {
        code(self.try_step(true))
    }

    fn prev(&mut self) -> c_int {
        code(self.try_step(false))
    }

    fn search(&mut self) -> c_int {
        code(self.try_search())
    }

    fn search_near(&mut self, exact: &mut c_int) -> c_int {
        code(self.try_search_near(exact))
    }

    fn insert(&mut self) -> c_int {
        code(self.try_insert())
    }

    fn update(&mut self) -> c_int {
        code(self.try_update())
    }

    fn remove(&mut self) -> c_int {
        code(self.try_remove())
    }
}

impl Drop for RefCursor {
    fn drop(&mut self) {
        if !self.closed {
            self.close();
        }
    }
}
