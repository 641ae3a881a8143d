//! Test fixtures and engine homes.
//!
//! Every fixture owns a temporary directory that outlives its connection,
//! so tests never leak state into each other.

use std::path::Path;
use tempfile::TempDir;
use wtbind::{Connection, ConnectionConfig, Result, Tri};

/// A connection on a temporary home with automatic cleanup.
pub struct TestHome {
    /// The open connection.
    pub conn: Connection,
    // Declared after `conn` so the directory is removed after the close.
    temp_dir: TempDir,
}

impl TestHome {
    /// Creates a fresh home with logging enabled.
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig {
            log: "(enabled)".into(),
            ..Default::default()
        })
    }

    /// Creates a fresh home with `config`. `create` is always forced on.
    pub fn with_config(config: ConnectionConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = ConnectionConfig {
            create: Tri::True,
            ..config
        };
        let conn = Connection::open(temp_dir.path(), Some(&config))
            .expect("Failed to open test connection");
        Self { conn, temp_dir }
    }

    /// Creates an in-memory home whose cache holds at most `cache_size`
    /// bytes. Zero means unbounded.
    pub fn in_memory(cache_size: u64) -> Self {
        Self::with_config(ConnectionConfig {
            in_memory: Tri::True,
            cache_size,
            ..Default::default()
        })
    }

    /// The home directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes the connection and opens the same home again with `config`.
    pub fn reopen(&mut self, config: Option<&ConnectionConfig>) -> Result<()> {
        self.conn.close(None)?;
        self.conn = Connection::open(self.temp_dir.path(), config)?;
        Ok(())
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestHome {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for TestHome {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// Runs a test against a connection on a temporary home.
///
/// # Example
///
/// ```rust
/// use wtbind_testkit::with_temp_home;
///
/// let tables = with_temp_home(|conn| {
///     let session = conn.open_session(None).unwrap();
///     session.create("table:a", None).unwrap();
///     1
/// });
/// assert_eq!(tables, 1);
/// ```
pub fn with_temp_home<F, R>(f: F) -> R
where
    F: FnOnce(&Connection) -> R,
{
    let home = TestHome::new();
    f(&home.conn)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// The key of record `i` in a populated table. Keys sort in `i` order.
    pub fn key(i: usize) -> Vec<u8> {
        format!("key{i:06}").into_bytes()
    }

    /// The value of record `i` in a populated table.
    pub fn value(i: usize) -> Vec<u8> {
        format!("value-{i}").into_bytes()
    }

    /// Creates `uri` and fills it with `count` records built by [`key`] and
    /// [`value`].
    pub fn populated_table(conn: &Connection, uri: &str, count: usize) {
        let session = conn.open_session(None).expect("Failed to open session");
        session.create(uri, None).expect("Failed to create table");
        let mut mutator = session
            .mutate(uri, None)
            .expect("Failed to open mutator");
        for i in 0..count {
            mutator
                .insert(&key(i), &value(i))
                .expect("Failed to insert record");
        }
    }

    /// Creates a home holding one populated table.
    pub fn populated_home(uri: &str, count: usize) -> TestHome {
        let home = TestHome::new();
        populated_table(&home, uri, count);
        home
    }
}
