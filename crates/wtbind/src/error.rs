//! Error types for the binding.
//!
//! Every engine call returns an integer code. [`check`] is the single place
//! those codes become [`Error`] values: zero is success, the engine's named
//! codes map to an [`ErrorKind`], and anything else is kept verbatim as
//! [`ErrorKind::Other`].

use std::ffi::c_int;
use thiserror::Error;
use wtbind_native::codes;

/// Result type for binding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Category of an engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Conflict with a concurrent transaction; roll back and retry.
    Rollback,
    /// Insert of a key that already exists.
    DuplicateKey,
    /// Key not found, or the end of a scan.
    NotFound,
    /// The engine cannot continue; the connection must be reopened.
    Panic,
    /// Recovery must run before the engine can continue.
    RunRecovery,
    /// The operation would overflow the cache.
    CacheFull,
    /// Conflict with a prepared transaction; retry later.
    PrepareConflict,
    /// Corruption detected; reopen with salvage.
    TrySalvage,
    /// Any other code, such as a POSIX `errno` value.
    Other(c_int),
}

impl ErrorKind {
    /// Categorises a result code. Zero is success and has no kind.
    pub const fn from_code(code: c_int) -> Option<Self> {
        Some(match code {
            0 => return None,
            codes::WT_ROLLBACK => Self::Rollback,
            codes::WT_DUPLICATE_KEY => Self::DuplicateKey,
            codes::WT_NOTFOUND => Self::NotFound,
            codes::WT_PANIC => Self::Panic,
            codes::WT_RUN_RECOVERY => Self::RunRecovery,
            codes::WT_CACHE_FULL => Self::CacheFull,
            codes::WT_PREPARE_CONFLICT => Self::PrepareConflict,
            codes::WT_TRY_SALVAGE => Self::TrySalvage,
            other => Self::Other(other),
        })
    }

    /// The code this kind was built from.
    pub const fn code(self) -> c_int {
        match self {
            Self::Rollback => codes::WT_ROLLBACK,
            Self::DuplicateKey => codes::WT_DUPLICATE_KEY,
            Self::NotFound => codes::WT_NOTFOUND,
            Self::Panic => codes::WT_PANIC,
            Self::RunRecovery => codes::WT_RUN_RECOVERY,
            Self::CacheFull => codes::WT_CACHE_FULL,
            Self::PrepareConflict => codes::WT_PREPARE_CONFLICT,
            Self::TrySalvage => codes::WT_TRY_SALVAGE,
            Self::Other(code) => code,
        }
    }
}

/// Errors returned by the binding.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine returned a non-zero code.
    #[error("{message}")]
    Engine {
        /// Category of the code.
        kind: ErrorKind,
        /// The raw code.
        code: c_int,
        /// The engine's description of the code.
        message: String,
    },

    /// A handle was used after it was closed.
    #[error("{handle} is closed")]
    Closed {
        /// Which kind of handle.
        handle: &'static str,
    },

    /// An argument the engine could never accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Builds the error for a non-zero engine code.
    pub(crate) fn engine(code: c_int) -> Self {
        Self::Engine {
            kind: ErrorKind::from_code(code).unwrap_or(ErrorKind::Other(code)),
            code,
            message: wtbind_native::strerror(code).into_owned(),
        }
    }

    /// Returns the engine error category, if this is an engine error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Engine { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns the numeric code. Misuse caught by the binding itself reports
    /// `EINVAL`, as the engine would.
    pub fn code(&self) -> c_int {
        match self {
            Self::Engine { code, .. } => *code,
            Self::Closed { .. } | Self::InvalidArgument(_) => codes::EINVAL,
        }
    }

    /// Returns true for a missing key or the end of a scan.
    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }

    /// Returns true for a write-write conflict.
    pub fn is_conflict(&self) -> bool {
        self.kind() == Some(ErrorKind::Rollback)
    }

    /// Returns true for an insert of an existing key.
    pub fn is_duplicate_key(&self) -> bool {
        self.kind() == Some(ErrorKind::DuplicateKey)
    }

    /// Returns true if the target is in use, such as a table with open
    /// cursors.
    pub fn is_busy(&self) -> bool {
        self.kind() == Some(ErrorKind::Other(codes::EBUSY))
    }

    /// Returns true if running the transaction again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            Some(ErrorKind::Rollback | ErrorKind::PrepareConflict)
        )
    }

    /// Returns true if the connection must be reopened or recovered.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), Some(ErrorKind::Panic | ErrorKind::RunRecovery))
    }
}

/// Maps an engine result code: zero is `Ok`, anything else an [`Error`].
pub fn check(code: c_int) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::engine(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert!(check(0).is_ok());
        assert_eq!(ErrorKind::from_code(0), None);
    }

    #[test]
    fn named_codes_map_to_kinds() {
        let cases = [
            (codes::WT_ROLLBACK, ErrorKind::Rollback),
            (codes::WT_DUPLICATE_KEY, ErrorKind::DuplicateKey),
            (codes::WT_NOTFOUND, ErrorKind::NotFound),
            (codes::WT_PANIC, ErrorKind::Panic),
            (codes::WT_RUN_RECOVERY, ErrorKind::RunRecovery),
            (codes::WT_CACHE_FULL, ErrorKind::CacheFull),
            (codes::WT_PREPARE_CONFLICT, ErrorKind::PrepareConflict),
            (codes::WT_TRY_SALVAGE, ErrorKind::TrySalvage),
        ];
        for (code, kind) in cases {
            assert_eq!(ErrorKind::from_code(code), Some(kind));
            assert_eq!(kind.code(), code);
            assert_eq!(check(code).unwrap_err().kind(), Some(kind));
        }
    }

    #[test]
    fn unknown_codes_keep_code_and_message() {
        let err = check(codes::WT_ERROR).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Other(codes::WT_ERROR)));
        assert_eq!(err.code(), codes::WT_ERROR);
        assert!(err.to_string().starts_with("WT_ERROR"));

        let err = check(codes::ENOENT).unwrap_err();
        assert_eq!(err.code(), codes::ENOENT);
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn predicates() {
        assert!(check(codes::WT_NOTFOUND).unwrap_err().is_not_found());
        assert!(check(codes::EBUSY).unwrap_err().is_busy());
        assert!(check(codes::WT_DUPLICATE_KEY).unwrap_err().is_duplicate_key());

        let conflict = check(codes::WT_ROLLBACK).unwrap_err();
        assert!(conflict.is_conflict() && conflict.is_retryable() && !conflict.is_fatal());
        assert!(check(codes::WT_PREPARE_CONFLICT).unwrap_err().is_retryable());
        assert!(check(codes::WT_PANIC).unwrap_err().is_fatal());
        assert!(!check(codes::WT_CACHE_FULL).unwrap_err().is_retryable());

        let closed = Error::Closed { handle: "session" };
        assert_eq!(closed.kind(), None);
        assert_eq!(closed.code(), codes::EINVAL);
        assert!(!closed.is_not_found());
    }
}
