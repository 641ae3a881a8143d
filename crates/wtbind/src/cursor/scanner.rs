//! Read-only cursor role.

use super::{Cursor, NearMatch};
use crate::error::Result;
use crate::view::BufferView;

/// A read-only cursor, opened in raw read-only mode by [`Session::scan`].
///
/// Reads are zero-copy: the `*_view` accessors borrow engine memory until
/// the scanner moves again. The copying accessors return owned bytes.
///
/// [`Session::scan`]: crate::Session::scan
#[derive(Debug)]
pub struct Scanner<'s> {
    cursor: Cursor<'s>,
}

impl<'s> Scanner<'s> {
    pub(crate) fn new(cursor: Cursor<'s>) -> Self {
        Self { cursor }
    }

    /// The data source the cursor is bound to.
    pub fn uri(&self) -> &str {
        self.cursor.uri()
    }

    /// Positions on `key`. See [`Cursor::search`].
    pub fn search(&mut self, key: &[u8]) -> Result<()> {
        self.cursor.search(key)
    }

    /// Positions on `key` or a neighbour. See [`Cursor::search_near`].
    pub fn search_near(&mut self, key: &[u8]) -> Result<NearMatch> {
        self.cursor.search_near(key)
    }

    /// Moves to the next record. See [`Cursor::next`].
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<()> {
        self.cursor.next()
    }

    /// Moves to the previous record. See [`Cursor::prev`].
    pub fn prev(&mut self) -> Result<()> {
        self.cursor.prev()
    }

    /// Unpositions the scanner.
    pub fn reset(&mut self) -> Result<()> {
        self.cursor.reset()
    }

    /// Borrows the current key.
    pub fn key_view(&self) -> Result<BufferView<'_>> {
        self.cursor.key_view()
    }

    /// Borrows the current value.
    pub fn value_view(&self) -> Result<BufferView<'_>> {
        self.cursor.value_view()
    }

    /// Copies the current key.
    pub fn key(&self) -> Result<Vec<u8>> {
        self.cursor.key()
    }

    /// Copies the current value.
    pub fn value(&self) -> Result<Vec<u8>> {
        self.cursor.value()
    }

    /// Searches for `key` and borrows its value.
    pub fn read_value_view(&mut self, key: &[u8]) -> Result<BufferView<'_>> {
        self.cursor.read_value_view(key)
    }

    /// Searches for `key`, copies its value and resets the scanner.
    pub fn read_value(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        self.cursor.read_value(key)
    }

    /// Walks forward from the current position, or from the first record
    /// if unpositioned, handing each record to `f` as borrowed views.
    ///
    /// Stops without error at the end of the data source. An error from `f`
    /// stops the walk and is returned.
    pub fn for_each<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(BufferView<'_>, BufferView<'_>) -> Result<()>,
    {
        loop {
            match self.cursor.next() {
                Ok(()) => {}
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            }
            f(self.cursor.key_view()?, self.cursor.value_view()?)?;
        }
    }

    /// Closes the cursor.
    pub fn close(self) -> Result<()> {
        self.cursor.close()
    }
}
