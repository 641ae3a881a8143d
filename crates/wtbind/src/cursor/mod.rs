//! Cursors over a data source.
//!
//! [`Cursor`] exposes the full native cursor. Sessions also hand out two
//! role-specialised wrappers around it:
//!
//! - [`Mutator`] - write-only: insert, update, remove
//! - [`Scanner`] - read-only: search, iterate, read keys and values
//!
//! ## Staging and reset
//!
//! The engine stages a key and value on the cursor before executing an
//! operation. The binding never exposes that intermediate state: each
//! mutation stages, executes and then resets the cursor, whatever the
//! outcome, so the cursor is always ready for the next call. A failed
//! mutation still reports its own error first.

mod mutator;
mod scanner;

pub use mutator::Mutator;
pub use scanner::Scanner;

use crate::error::{check, Error, Result};
use crate::session::Session;
use crate::view::BufferView;
use std::ffi::c_int;
use std::marker::PhantomData;
use wtbind_native::{Item, NativeCursor};

/// Outcome of [`Cursor::search_near`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NearMatch {
    /// Positioned on the requested key.
    Exact,
    /// Positioned on the nearest smaller key.
    Smaller,
    /// Positioned on the nearest larger key.
    Larger,
}

impl NearMatch {
    fn from_exact(exact: c_int) -> Self {
        match exact {
            0 => Self::Exact,
            e if e < 0 => Self::Smaller,
            _ => Self::Larger,
        }
    }
}

/// A cursor bound to one data source, owned by one session.
///
/// Views returned by [`key_view`](Self::key_view) and
/// [`value_view`](Self::value_view) borrow the cursor and must be dropped
/// before it moves again.
pub struct Cursor<'s> {
    native: Option<Box<dyn NativeCursor>>,
    _session: PhantomData<&'s Session<'s>>,
}

impl<'s> Cursor<'s> {
    pub(crate) fn new(native: Box<dyn NativeCursor>, _session: &'s Session<'_>) -> Self {
        tracing::trace!(uri = native.uri(), "cursor opened");
        Self {
            native: Some(native),
            _session: PhantomData,
        }
    }

    fn native(&self) -> Result<&dyn NativeCursor> {
        self.native
            .as_deref()
            .ok_or(Error::Closed { handle: "cursor" })
    }

    fn native_mut(&mut self) -> Result<&mut (dyn NativeCursor + 'static)> {
        self.native
            .as_deref_mut()
            .ok_or(Error::Closed { handle: "cursor" })
    }

    /// The data source the cursor is bound to.
    pub fn uri(&self) -> &str {
        self.native.as_deref().map_or("", |native| native.uri())
    }

    /// Closes the cursor.
    pub fn close(mut self) -> Result<()> {
        match self.native.take() {
            Some(mut native) => check(native.close()),
            None => Err(Error::Closed { handle: "cursor" }),
        }
    }

    /// Unpositions the cursor and clears anything staged on it.
    pub fn reset(&mut self) -> Result<()> {
        check(self.native_mut()?.reset())
    }

    /// Positions the cursor on `key`.
    ///
    /// Fails with a not-found error if the key is absent, leaving the cursor
    /// unpositioned.
    pub fn search(&mut self, key: &[u8]) -> Result<()> {
        let native = self.native_mut()?;
        native.set_key(key);
        check(native.search())
    }

    /// Positions the cursor on `key` or, failing that, on a neighbour.
    ///
    /// Callers must branch on the returned [`NearMatch`]: the engine prefers
    /// the nearest smaller key and falls back to the nearest larger one.
    /// Fails with a not-found error only if the data source is empty.
    pub fn search_near(&mut self, key: &[u8]) -> Result<NearMatch> {
        let native = self.native_mut()?;
        native.set_key(key);
        let mut exact: c_int = 0;
        check(native.search_near(&mut exact))?;
        Ok(NearMatch::from_exact(exact))
    }

    /// Moves to the next record, or to the first one if unpositioned.
    ///
    /// Past the last record this fails with the same not-found error a
    /// missing key produces; that is the normal end of a scan.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<()> {
        check(self.native_mut()?.next())
    }

    /// Moves to the previous record, or to the last one if unpositioned.
    pub fn prev(&mut self) -> Result<()> {
        check(self.native_mut()?.prev())
    }

    fn view_with(
        &self,
        get: impl FnOnce(&dyn NativeCursor, &mut Item) -> c_int,
    ) -> Result<BufferView<'_>> {
        let native = self.native()?;
        let mut item = Item::empty();
        check(get(native, &mut item))?;
        // SAFETY: `NativeCursor` implementors keep the item's memory valid
        // until the next `&mut` call on the cursor. Every such call goes
        // through `&mut self` here, which cannot happen while the returned
        // view borrows `self`.
        Ok(unsafe { BufferView::from_item(item) })
    }

    /// Borrows the key at the current position without copying.
    pub fn key_view(&self) -> Result<BufferView<'_>> {
        self.view_with(|native, item| native.get_key(item))
    }

    /// Borrows the value at the current position without copying.
    ///
    /// An empty value is an empty view, never an error.
    pub fn value_view(&self) -> Result<BufferView<'_>> {
        self.view_with(|native, item| native.get_value(item))
    }

    /// Copies the key at the current position.
    pub fn key(&self) -> Result<Vec<u8>> {
        Ok(self.key_view()?.to_vec())
    }

    /// Copies the value at the current position.
    pub fn value(&self) -> Result<Vec<u8>> {
        Ok(self.value_view()?.to_vec())
    }

    /// Searches for `key` and borrows its value.
    pub fn read_value_view(&mut self, key: &[u8]) -> Result<BufferView<'_>> {
        self.search(key)?;
        self.value_view()
    }

    /// Searches for `key`, copies its value and resets the cursor.
    pub fn read_value(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let value = self.read_value_view(key)?.to_vec();
        self.reset()?;
        Ok(value)
    }

    /// Runs one staged mutation and resets afterwards, whatever the outcome.
    fn mutate(
        &mut self,
        key: &[u8],
        value: Option<&[u8]>,
        op: impl FnOnce(&mut dyn NativeCursor) -> c_int,
    ) -> Result<()> {
        let native = self.native_mut()?;
        native.set_key(key);
        if let Some(value) = value {
            native.set_value(value);
        }
        let outcome = check(op(native));
        let reset = check(native.reset());
        outcome.and(reset)
    }

    /// Inserts `key` with `value`.
    ///
    /// With `overwrite` disabled, fails with a duplicate-key error if the
    /// key exists. An empty value is stored as a zero-length value.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.mutate(key, Some(value), |native| native.insert())
    }

    /// Replaces the value of `key`.
    ///
    /// With `overwrite` disabled, fails with a not-found error if the key is
    /// absent.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.mutate(key, Some(value), |native| native.update())
    }

    /// Removes `key`. Fails with a not-found error if it is absent.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.mutate(key, None, |native| native.remove())
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        if let Some(mut native) = self.native.take() {
            let rc = native.close();
            if rc != 0 {
                tracing::warn!(
                    uri = native.uri(),
                    error = %wtbind_native::strerror(rc),
                    "failed to close dropped cursor"
                );
            }
        }
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("uri", &self.uri())
            .field("closed", &self.native.is_none())
            .finish()
    }
}
