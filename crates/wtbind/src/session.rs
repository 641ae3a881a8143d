//! Sessions: the unit of work and of single-threaded use.
//!
//! A [`Session`] is derived from a [`Connection`] and borrows it, so the
//! connection cannot be closed while a session is alive. Cursors borrow the
//! session in turn. A session is [`Send`] but not [`Sync`]: move it to the
//! thread that uses it, but never share it.

use crate::config::{
    encode, CreateConfig, CursorConfig, DropConfig, LogFlushConfig, SyncMode, TxBeginConfig,
    TxCommitConfig,
};
use crate::connection::Connection;
use crate::cursor::{Cursor, Mutator, Scanner};
use crate::error::{check, Error, Result};
use crate::retry::RetryPolicy;
use std::cell::Cell;
use std::marker::PhantomData;
use wtbind_native::NativeSession;

/// A session on an open connection.
///
/// Transaction state is tracked alongside the engine: [`in_transaction`]
/// becomes true only after a successful begin and false after any commit
/// or rollback attempt, whatever its outcome.
///
/// [`in_transaction`]: Self::in_transaction
pub struct Session<'c> {
    native: Option<Box<dyn NativeSession>>,
    in_tx: Cell<bool>,
    _conn: PhantomData<&'c Connection>,
}

impl<'c> Session<'c> {
    pub(crate) fn new(native: Box<dyn NativeSession>, _conn: &'c Connection) -> Self {
        tracing::debug!("session opened");
        Self {
            native: Some(native),
            in_tx: Cell::new(false),
            _conn: PhantomData,
        }
    }

    fn native(&self) -> Result<&dyn NativeSession> {
        self.native
            .as_deref()
            .ok_or(Error::Closed { handle: "session" })
    }

    /// Closes the session, rolling back any running transaction.
    ///
    /// The handle is invalidated only on success; a failed close can be
    /// retried. Closing an already closed session fails with
    /// [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        let native = self
            .native
            .as_deref_mut()
            .ok_or(Error::Closed { handle: "session" })?;
        check(native.close())?;
        self.native = None;
        self.in_tx.set(false);
        tracing::debug!("session closed");
        Ok(())
    }

    /// Returns true once [`close`](Self::close) has succeeded.
    pub fn is_closed(&self) -> bool {
        self.native.is_none()
    }

    /// Returns true between a successful begin and the next commit or
    /// rollback.
    pub fn in_transaction(&self) -> bool {
        self.in_tx.get()
    }

    /// Creates a data source such as `table:users`.
    ///
    /// Fails if the data source exists, unless `exclusive` is disabled.
    pub fn create(&self, name: &str, config: Option<&CreateConfig>) -> Result<()> {
        reject_nul("data source name", name)?;
        let config = encode(config);
        check(self.native()?.create(name, config.as_deref()))
    }

    /// Drops a data source.
    ///
    /// Fails with a busy error while any cursor is open on it. Cursors are
    /// never closed on the caller's behalf.
    pub fn drop_source(&self, name: &str, config: Option<&DropConfig>) -> Result<()> {
        reject_nul("data source name", name)?;
        let config = encode(config);
        check(self.native()?.drop_source(name, config.as_deref()))
    }

    /// Opens a general-purpose cursor with the caller's configuration.
    pub fn open_cursor(&self, uri: &str, config: Option<&CursorConfig>) -> Result<Cursor<'_>> {
        self.cursor_with(uri, config.cloned().unwrap_or_default())
    }

    /// Opens a write-only cursor in raw mode.
    pub fn mutate(&self, uri: &str, config: Option<&CursorConfig>) -> Result<Mutator<'_>> {
        let config = config.cloned().unwrap_or_default().forced(true, None);
        Ok(Mutator::new(self.cursor_with(uri, config)?))
    }

    /// Opens a read-only cursor in raw mode.
    ///
    /// Raw and read-only are forced on whatever `config` says.
    pub fn scan(&self, uri: &str, config: Option<&CursorConfig>) -> Result<Scanner<'_>> {
        let config = config.cloned().unwrap_or_default().forced(true, Some(true));
        Ok(Scanner::new(self.cursor_with(uri, config)?))
    }

    fn cursor_with(&self, uri: &str, config: CursorConfig) -> Result<Cursor<'_>> {
        reject_nul("cursor uri", uri)?;
        let config = encode(Some(&config));
        let native = self
            .native()?
            .open_cursor(uri, config.as_deref())
            .map_err(Error::engine)?;
        Ok(Cursor::new(native, self))
    }

    /// Flushes the log with the given sync mode. May block on I/O.
    pub fn log_flush(&self, sync: SyncMode) -> Result<()> {
        let config = encode(Some(&LogFlushConfig { sync: Some(sync) }));
        check(self.native()?.log_flush(config.as_deref()))
    }

    /// Starts a transaction. Nested transactions are rejected by the engine.
    pub fn begin_transaction(&self, config: Option<&TxBeginConfig>) -> Result<()> {
        let config = encode(config);
        check(self.native()?.begin_transaction(config.as_deref()))?;
        self.in_tx.set(true);
        Ok(())
    }

    /// Commits the running transaction.
    ///
    /// A commit that fails has still ended the transaction.
    pub fn commit_transaction(&self, config: Option<&TxCommitConfig>) -> Result<()> {
        let config = encode(config);
        let native = self.native()?;
        let rc = native.commit_transaction(config.as_deref());
        self.in_tx.set(false);
        check(rc)
    }

    /// Rolls back the running transaction.
    pub fn rollback_transaction(&self) -> Result<()> {
        let native = self.native()?;
        let rc = native.rollback_transaction(None);
        self.in_tx.set(false);
        check(rc)
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits if `f` succeeds. Otherwise rolls back and returns the error
    /// from `f`.
    pub fn transaction<T, F>(&self, config: Option<&TxBeginConfig>, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.begin_transaction(config)?;
        match f(self) {
            Ok(value) => {
                self.commit_transaction(None)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.rollback_transaction() {
                    tracing::warn!(error = %rollback, "rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }

    /// Runs `f` in a transaction, retrying conflicts with backoff.
    ///
    /// Only [retryable](Error::is_retryable) errors from the body or the
    /// commit trigger another attempt; everything else is returned at once.
    /// After `policy.max_attempts` attempts the last error is returned.
    pub fn run_in_transaction<T, F>(
        &self,
        config: Option<&TxBeginConfig>,
        policy: &RetryPolicy,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut(&Self) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            let delay = policy.delay_for_attempt(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            attempt += 1;
            match self.transaction(config, &mut f) {
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    tracing::debug!(attempt, error = %err, "retrying transaction");
                }
                outcome => return outcome,
            }
        }
    }
}

fn reject_nul(what: &str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(Error::InvalidArgument(format!(
            "{what} {value:?} contains a NUL byte"
        )));
    }
    Ok(())
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Some(mut native) = self.native.take() {
            let rc = native.close();
            if rc != 0 {
                tracing::warn!(
                    error = %wtbind_native::strerror(rc),
                    "failed to close dropped session"
                );
            }
        }
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("closed", &self.is_closed())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}
