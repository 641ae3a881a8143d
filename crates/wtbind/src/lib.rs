//! # wtbind
//!
//! A safe binding to a WiredTiger-style embedded key-value engine.
//!
//! This crate provides:
//! - [`Connection`], [`Session`] and [`Cursor`] handles whose lifetimes
//!   mirror the engine's ownership rules
//! - Role-specialised cursors: [`Mutator`] for writes, [`Scanner`] for reads
//! - Zero-copy reads through [`BufferView`], checked by the borrow checker
//! - Typed option structs that encode to the engine's configuration strings
//! - A closed error taxonomy ([`ErrorKind`]) with retry predicates
//! - Transaction helpers with conflict retry ([`RetryPolicy`])
//!
//! ## Design Principles
//!
//! - Every engine result code passes through [`check`]; none is swallowed
//! - A handle is invalidated only when its close succeeds
//! - Keys and values are opaque bytes: mutators and scanners always run in
//!   raw mode
//! - Every mutation leaves its cursor reset and ready for reuse
//!
//! ## Example
//!
//! ```rust
//! use wtbind::{Connection, ConnectionConfig, NearMatch, Tri};
//!
//! # fn main() -> wtbind::Result<()> {
//! # let home = tempfile::tempdir().unwrap();
//! let config = ConnectionConfig { create: Tri::True, ..Default::default() };
//! let conn = Connection::open(home.path(), Some(&config))?;
//! let session = conn.open_session(None)?;
//! session.create("table:fruit", None)?;
//!
//! let mut mutator = session.mutate("table:fruit", None)?;
//! mutator.insert(b"apple", b"red")?;
//! mutator.insert(b"cherry", b"dark red")?;
//! mutator.close()?;
//!
//! let mut scanner = session.scan("table:fruit", None)?;
//! assert_eq!(scanner.read_value(b"apple")?, b"red");
//! assert_eq!(scanner.search_near(b"banana")?, NearMatch::Smaller);
//! assert_eq!(scanner.key_view()?, *b"apple");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod config;
mod connection;
mod cursor;
mod error;
mod retry;
mod session;
mod view;

pub use config::{
    CloseConfig, ConnectionConfig, CreateConfig, CursorConfig, DropConfig, Isolation,
    SessionConfig, Statistics, SyncMode, Tri, TxBeginConfig, TxCommitConfig,
};
pub use connection::Connection;
pub use cursor::{Cursor, Mutator, NearMatch, Scanner};
pub use error::{check, Error, ErrorKind, Result};
pub use retry::RetryPolicy;
pub use session::Session;
pub use view::BufferView;
pub use wtbind_native::{codes, NativeEngine, ReferenceEngine};
