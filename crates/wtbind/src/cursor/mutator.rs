//! Write-only cursor role.

use super::Cursor;
use crate::error::Result;

/// A write-only cursor, opened in raw mode by [`Session::mutate`].
///
/// Keys and values are borrowed for the duration of each call only.
///
/// [`Session::mutate`]: crate::Session::mutate
#[derive(Debug)]
pub struct Mutator<'s> {
    cursor: Cursor<'s>,
}

impl<'s> Mutator<'s> {
    pub(crate) fn new(cursor: Cursor<'s>) -> Self {
        Self { cursor }
    }

    /// The data source the cursor is bound to.
    pub fn uri(&self) -> &str {
        self.cursor.uri()
    }

    /// Inserts `key` with `value`. See [`Cursor::insert`].
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.cursor.insert(key, value)
    }

    /// Replaces the value of `key`. See [`Cursor::update`].
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.cursor.update(key, value)
    }

    /// Removes `key`. See [`Cursor::remove`].
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.cursor.remove(key)
    }

    /// Closes the cursor.
    pub fn close(self) -> Result<()> {
        self.cursor.close()
    }
}
