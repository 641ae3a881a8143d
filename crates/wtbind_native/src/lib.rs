//! # wtbind native
//!
//! The native side of the wtbind binding.
//!
//! This crate provides:
//! - The handle traits a storage engine implements ([`NativeEngine`],
//!   [`NativeConnection`], [`NativeSession`], [`NativeCursor`])
//! - The engine's result codes and [`strerror`]
//! - The configuration string grammar ([`ParsedConfig`])
//! - [`ReferenceEngine`], a complete in-process engine behind those traits
//!
//! ## Design Principles
//!
//! - The seam is code-based: methods return `0` or an engine result code,
//!   never a Rust error type
//! - Reads lend engine-owned memory through [`Item`]; nothing is copied
//!   until the binding decides to
//! - Configuration crosses the seam as a string, exactly as the engine
//!   would receive it
//!
//! ## Example
//!
//! ```rust
//! use wtbind_native::{codes, Item, NativeEngine, ReferenceEngine};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let conn = ReferenceEngine.open(dir.path(), Some("create")).unwrap();
//! let session = conn.open_session(None).unwrap();
//! assert_eq!(session.create("table:t", None), 0);
//!
//! let mut cursor = session.open_cursor("table:t", Some("raw")).unwrap();
//! cursor.set_key(b"missing");
//! assert_eq!(cursor.search(), codes::WT_NOTFOUND);
//!
//! let mut item = Item::empty();
//! assert_eq!(cursor.get_value(&mut item), codes::EINVAL);
//! ```

#![warn(missing_docs)]

mod backend;
pub mod codes;
mod error;
mod grammar;
mod reference;

pub use backend::{Item, NativeConnection, NativeCursor, NativeEngine, NativeSession};
pub use codes::strerror;
pub use error::{GrammarError, GrammarResult, HomeError, HomeResult};
pub use grammar::{ConfigItem, ParsedConfig};
pub use reference::ReferenceEngine;
