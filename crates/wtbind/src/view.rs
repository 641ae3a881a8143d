//! Zero-copy views of engine-owned bytes.
//!
//! A [`BufferView`] borrows memory the engine lent out for the cursor's
//! current position. The engine may reuse that memory on the next cursor
//! operation, so a view borrows the cursor: every positioning or mutating
//! call needs `&mut`, and the borrow checker rejects it while a view is
//! alive.
//!
//! ```compile_fail
//! # fn demo(scanner: &mut wtbind::Scanner<'_>) -> wtbind::Result<()> {
//! let key = scanner.key_view()?;
//! scanner.next()?; // the scanner is still borrowed by `key`
//! assert!(!key.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! Copy out what must outlive the position:
//!
//! ```rust
//! # fn demo(scanner: &mut wtbind::Scanner<'_>) -> wtbind::Result<()> {
//! let key = scanner.key_view()?.to_vec();
//! scanner.next()?;
//! assert!(!key.is_empty());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::ops::Deref;
use std::slice;
use wtbind_native::Item;

/// Bytes on loan from the engine, valid for the borrow `'a`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferView<'a> {
    bytes: &'a [u8],
}

impl<'a> BufferView<'a> {
    /// Wraps an item filled by the engine.
    ///
    /// A zero size yields an empty view without reading `data`, which the
    /// engine may leave null.
    ///
    /// # Safety
    ///
    /// Unless `item.size` is zero, `item.data` must point to `item.size`
    /// initialised bytes that stay valid and unchanged for `'a`.
    pub(crate) unsafe fn from_item(item: Item) -> Self {
        if item.size == 0 || item.data.is_null() {
            return Self { bytes: &[] };
        }
        // SAFETY: upheld by the caller.
        let bytes = unsafe { slice::from_raw_parts(item.data, item.size) };
        Self { bytes }
    }

    /// The borrowed bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Copies the bytes into an owned buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl Deref for BufferView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl AsRef<[u8]> for BufferView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl PartialEq<[u8]> for BufferView<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl<const N: usize> PartialEq<[u8; N]> for BufferView<'_> {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.bytes == other
    }
}

impl fmt::Debug for BufferView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferView(b\"{}\")", self.bytes.escape_ascii())
    }
}
