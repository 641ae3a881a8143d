//! Native handle traits.
//!
//! These traits mirror the engine's C handle API one call at a time. They
//! are deliberately thin: configuration arrives as an already-encoded string
//! (`None` meaning "all defaults"), results leave as raw integer codes, and
//! reads hand back engine-owned memory through [`Item`].
//!
//! # Invariants
//!
//! - Every method except a constructor returns `0` on success and a code
//!   from [`crate::codes`] otherwise
//! - Slices passed to `set_key`/`set_value` are only borrowed for the call
//! - A closed handle must not be used again; implementations are free to
//!   return any error for calls after `close`
//!
//! # Safety
//!
//! Callers build borrowed slices from the [`Item`]s a cursor lends out
//! without checking them, so every trait here is `unsafe` to implement.
//! An implementation must guarantee that whenever `get_key`/`get_value`
//! returns `0`, the item either has `size == 0` or points to `size`
//! initialised bytes that stay valid and unchanged until the next call
//! taking `&mut self` on that cursor, or until the cursor is dropped. The
//! engine, connection and session traits are `unsafe` as well, because the
//! cursors they hand out must keep that promise.
//!
//! # Implementors
//!
//! - [`crate::ReferenceEngine`] - the bundled in-process engine

use std::ffi::c_int;
use std::path::Path;

/// A borrowed byte buffer lent out by the engine.
///
/// Mirrors the engine's item struct: `data` may be null when `size` is
/// zero, so readers must check the size before building a slice.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Item {
    /// Start of the buffer.
    pub data: *const u8,
    /// Length in bytes.
    pub size: usize,
}

impl Item {
    /// An item with no data and a null pointer.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: std::ptr::null(),
            size: 0,
        }
    }

    /// Points an item at a slice. An empty slice yields a null pointer.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        Self {
            data: bytes.as_ptr(),
            size: bytes.len(),
        }
    }
}

impl Default for Item {
    fn default() -> Self {
        Self::empty()
    }
}

/// Entry point of an engine: opens connections.
///
/// # Safety
///
/// Every cursor reachable from the returned connection must uphold the
/// contract of [`NativeCursor`]. A safe implementation is rejected:
///
/// ```compile_fail
/// use std::ffi::c_int;
/// use std::path::Path;
/// use wtbind_native::{NativeConnection, NativeEngine};
///
/// struct Forged;
///
/// impl NativeEngine for Forged {
///     fn open(&self, _: &Path, _: Option<&str>) -> Result<Box<dyn NativeConnection>, c_int> {
///         Err(wtbind_native::codes::ENOTSUP)
///     }
/// }
/// ```
pub unsafe trait NativeEngine: Send + Sync {
    /// Opens the engine in the `home` directory.
    ///
    /// # Errors
    ///
    /// Returns the engine's code if the home is missing, locked by another
    /// connection, or inconsistent with `config`.
    fn open(&self, home: &Path, config: Option<&str>) -> Result<Box<dyn NativeConnection>, c_int>;
}

/// A connection handle. Shared across threads to derive sessions.
///
/// # Safety
///
/// Every cursor reachable from this connection must uphold the contract of
/// [`NativeCursor`].
pub unsafe trait NativeConnection: Send + Sync {
    /// Closes the connection. Fails while sessions are open.
    fn close(&mut self, config: Option<&str>) -> c_int;

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns the engine's code if the session cannot be opened.
    fn open_session(&self, config: Option<&str>) -> Result<Box<dyn NativeSession>, c_int>;
}

/// A session handle. Used by one thread at a time.
///
/// # Safety
///
/// Every cursor this session opens must uphold the contract of
/// [`NativeCursor`].
pub unsafe trait NativeSession: Send {
    /// Closes the session. Fails while cursors are open.
    fn close(&mut self) -> c_int;

    /// Creates a data source.
    fn create(&self, name: &str, config: Option<&str>) -> c_int;

    /// Drops a data source. Fails while cursors are open on it.
    fn drop_source(&self, name: &str, config: Option<&str>) -> c_int;

    /// Opens a cursor on a data source.
    ///
    /// # Errors
    ///
    /// Returns the engine's code if the data source is missing or `config`
    /// is invalid.
    fn open_cursor(&self, uri: &str, config: Option<&str>) -> Result<Box<dyn NativeCursor>, c_int>;

    /// Flushes the log.
    fn log_flush(&self, config: Option<&str>) -> c_int;

    /// Starts a transaction.
    fn begin_transaction(&self, config: Option<&str>) -> c_int;

    /// Commits the running transaction.
    fn commit_transaction(&self, config: Option<&str>) -> c_int;

    /// Rolls back the running transaction.
    fn rollback_transaction(&self, config: Option<&str>) -> c_int;
}

/// A cursor handle. Owned by one session.
///
/// # Safety
///
/// Whenever `get_key` or `get_value` returns `0`, the [`Item`] it filled
/// must either have `size == 0` or point to `size` initialised bytes that
/// stay valid and unchanged until the next call taking `&mut self` on this
/// cursor, or until the cursor is dropped. Callers turn items into slices
/// without further checks.
pub unsafe trait NativeCursor: Send {
    /// The data source the cursor is bound to.
    fn uri(&self) -> &str;

    /// Closes the cursor.
    fn close(&mut self) -> c_int;

    /// Unpositions the cursor and clears staged key and value.
    fn reset(&mut self) -> c_int;

    /// Stages the key for the next operation.
    fn set_key(&mut self, key: &[u8]);

    /// Stages the value for the next operation.
    fn set_value(&mut self, value: &[u8]);

    /// Lends out the key at the current position.
    fn get_key(&self, item: &mut Item) -> c_int;

    /// Lends out the value at the current position.
    fn get_value(&self, item: &mut Item) -> c_int;

    /// Moves to the next record.
    fn next(&mut self) -> c_int;

    /// Moves to the previous record.
    fn prev(&mut self) -> c_int;

    /// Positions on the staged key.
    fn search(&mut self) -> c_int;

    /// Positions on the staged key or its nearest neighbour. `exact` is set
    /// to zero on an exact match, negative if positioned on a smaller key
    /// and positive if positioned on a larger one.
    fn search_near(&mut self, exact: &mut c_int) -> c_int;

    /// Inserts the staged key and value.
    fn insert(&mut self) -> c_int;

    /// Updates the staged key with the staged value.
    fn update(&mut self) -> c_int;

    /// Removes the staged key.
    fn remove(&mut self) -> c_int;
}
