//! Connections to an engine home.

use crate::config::{encode, CloseConfig, ConnectionConfig, SessionConfig};
use crate::error::{check, Error, Result};
use crate::session::Session;
use std::path::{Path, PathBuf};
use wtbind_native::{NativeConnection, NativeEngine, ReferenceEngine};

/// An open engine home.
///
/// The connection is [`Sync`]: share it by reference across threads and
/// open one [`Session`] per thread.
///
/// ```rust
/// use wtbind::{Connection, ConnectionConfig, Tri};
///
/// # fn main() -> wtbind::Result<()> {
/// # let home = tempfile::tempdir().unwrap();
/// let config = ConnectionConfig { create: Tri::True, ..Default::default() };
/// let mut conn = Connection::open(home.path(), Some(&config))?;
/// conn.open_session(None)?.create("table:shared", None)?;
///
/// std::thread::scope(|scope| {
///     for id in 0..2u8 {
///         let conn = &conn;
///         scope.spawn(move || -> wtbind::Result<()> {
///             let session = conn.open_session(None)?;
///             let mut mutator = session.mutate("table:shared", None)?;
///             mutator.insert(&[id], b"written")
///         });
///     }
/// });
///
/// conn.close(None)?;
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    native: Option<Box<dyn NativeConnection>>,
    home: PathBuf,
}

impl Connection {
    /// Opens `home` with the bundled reference engine.
    ///
    /// The directory must exist. On first use, `create` must be set.
    pub fn open(home: impl AsRef<Path>, config: Option<&ConnectionConfig>) -> Result<Self> {
        Self::open_with(&ReferenceEngine, home, config)
    }

    /// Opens `home` with a caller-supplied engine.
    ///
    /// The engine traits are `unsafe` to implement: zero-copy reads trust
    /// the memory their cursors lend out.
    pub fn open_with(
        engine: &dyn NativeEngine,
        home: impl AsRef<Path>,
        config: Option<&ConnectionConfig>,
    ) -> Result<Self> {
        let home = home.as_ref();
        let encoded = encode(config);
        let native = engine
            .open(home, encoded.as_deref())
            .map_err(Error::engine)?;
        tracing::debug!(home = %home.display(), "connection opened");
        Ok(Self {
            native: Some(native),
            home: home.to_path_buf(),
        })
    }

    /// The home directory this connection was opened on.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Returns true once [`close`](Self::close) has succeeded.
    pub fn is_closed(&self) -> bool {
        self.native.is_none()
    }

    /// Closes the connection, checkpointing committed data.
    ///
    /// The handle is invalidated only on success. Closing an already closed
    /// connection fails with [`Error::Closed`].
    pub fn close(&mut self, config: Option<&CloseConfig>) -> Result<()> {
        let native = self
            .native
            .as_deref_mut()
            .ok_or(Error::Closed { handle: "connection" })?;
        let encoded = encode(config);
        check(native.close(encoded.as_deref()))?;
        self.native = None;
        tracing::debug!(home = %self.home.display(), "connection closed");
        Ok(())
    }

    /// Opens a session. The session borrows the connection.
    pub fn open_session(&self, config: Option<&SessionConfig>) -> Result<Session<'_>> {
        let native = self
            .native
            .as_deref()
            .ok_or(Error::Closed { handle: "connection" })?;
        let encoded = encode(config);
        let session = native
            .open_session(encoded.as_deref())
            .map_err(Error::engine)?;
        Ok(Session::new(session, self))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(mut native) = self.native.take() {
            let rc = native.close(None);
            if rc != 0 {
                tracing::warn!(
                    home = %self.home.display(),
                    error = %wtbind_native::strerror(rc),
                    "failed to close dropped connection"
                );
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("home", &self.home)
            .field("closed", &self.is_closed())
            .finish()
    }
}
