//! Internal error types for the native layer.
//!
//! Nothing here crosses the handle seam: every error is flattened to a
//! result code with [`GrammarError::code`] or [`HomeError::code`] before it
//! is returned from a trait method.

use crate::codes::{EINVAL, ENOENT, WT_PANIC, WT_TRY_SALVAGE};
use std::ffi::c_int;
use std::io;
use thiserror::Error;

/// Result type for configuration parsing.
pub type GrammarResult<T> = Result<T, GrammarError>;

/// Errors raised while parsing or validating a configuration string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    /// A character that cannot appear at this position.
    #[error("unexpected '{found}' at offset {offset}")]
    Unexpected {
        /// The offending character.
        found: char,
        /// Byte offset into the input.
        offset: usize,
    },

    /// Input ended where a key or value was expected.
    #[error("unexpected end of configuration")]
    UnexpectedEnd,

    /// A quoted string or nested list was not closed.
    #[error("unterminated {what} starting near offset {offset}")]
    Unterminated {
        /// What was left open.
        what: &'static str,
        /// Byte offset into the input.
        offset: usize,
    },

    /// The key is not accepted by this call.
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    /// The value has the wrong shape for its key.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The key whose value was rejected.
        key: String,
        /// Why it was rejected.
        message: String,
    },
}

impl GrammarError {
    /// Creates an invalid value error.
    pub fn invalid_value(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// All configuration errors surface as `EINVAL`.
    pub fn code(&self) -> c_int {
        EINVAL
    }
}

/// Result type for home directory operations.
pub type HomeResult<T> = Result<T, HomeError>;

/// Errors raised while opening, locking or checkpointing a home directory.
#[derive(Debug, Error)]
pub enum HomeError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The home directory does not exist.
    #[error("home directory does not exist: {0}")]
    Missing(String),

    /// The home has never been created and `create` was not given.
    #[error("no database in {0} and create was not configured")]
    NotCreated(String),

    /// Another handle holds the home's lock file.
    #[error("home is locked by another connection")]
    Locked,

    /// The metadata file failed to decode.
    #[error("metadata corrupted: {0}")]
    Corrupted(String),

    /// A checkpoint could not be written.
    #[error("checkpoint failed: {0}")]
    Checkpoint(String),
}

impl HomeError {
    /// Maps the error to the code the engine reports for it.
    pub fn code(&self) -> c_int {
        match self {
            Self::Io(e) => e.raw_os_error().unwrap_or(EINVAL),
            Self::Missing(_) | Self::NotCreated(_) => ENOENT,
            Self::Locked => crate::codes::EBUSY,
            Self::Corrupted(_) => WT_TRY_SALVAGE,
            Self::Checkpoint(_) => WT_PANIC,
        }
    }
}
