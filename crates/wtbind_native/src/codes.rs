//! Engine result codes.
//!
//! Every native call returns a C integer. Zero is success, the engine's own
//! conditions use a reserved negative range, and everything else is a POSIX
//! `errno` value.

use std::borrow::Cow;
use std::ffi::c_int;

/// Conflict between concurrent operations; the transaction must roll back.
pub const WT_ROLLBACK: c_int = -31800;
/// Attempt to insert an existing key.
pub const WT_DUPLICATE_KEY: c_int = -31801;
/// Non-specific engine error.
pub const WT_ERROR: c_int = -31802;
/// Item not found, also returned at the end of a scan.
pub const WT_NOTFOUND: c_int = -31803;
/// The engine has panicked and must be reopened.
pub const WT_PANIC: c_int = -31804;
/// Restart the operation (internal to the engine).
pub const WT_RESTART: c_int = -31805;
/// Recovery must be run before the home can be used.
pub const WT_RUN_RECOVERY: c_int = -31806;
/// Operation would overflow the cache.
pub const WT_CACHE_FULL: c_int = -31807;
/// Conflict with a prepared update.
pub const WT_PREPARE_CONFLICT: c_int = -31808;
/// Database corruption detected; salvage may recover it.
pub const WT_TRY_SALVAGE: c_int = -31809;

/// No such file or directory.
pub const ENOENT: c_int = 2;
/// Out of memory, or a configured handle limit reached.
pub const ENOMEM: c_int = 12;
/// Device or resource busy.
pub const EBUSY: c_int = 16;
/// File exists.
pub const EEXIST: c_int = 17;
/// Invalid argument.
pub const EINVAL: c_int = 22;
/// Operation not supported.
pub const ENOTSUP: c_int = 95;

/// Renders the engine's message for a result code.
///
/// Named engine codes get their fixed description, positive codes are
/// rendered as operating-system errors, and anything else is reported as
/// unknown.
pub fn strerror(code: c_int) -> Cow<'static, str> {
    let msg = match code {
        0 => "Successful return: 0",
        WT_ROLLBACK => "WT_ROLLBACK: conflict between concurrent operations",
        WT_DUPLICATE_KEY => "WT_DUPLICATE_KEY: attempt to insert an existing key",
        WT_ERROR => "WT_ERROR: non-specific WiredTiger error",
        WT_NOTFOUND => "WT_NOTFOUND: item not found",
        WT_PANIC => "WT_PANIC: WiredTiger library panic",
        WT_RESTART => "WT_RESTART: restart the operation (internal)",
        WT_RUN_RECOVERY => "WT_RUN_RECOVERY: recovery must be run to continue",
        WT_CACHE_FULL => "WT_CACHE_FULL: operation would overflow cache",
        WT_PREPARE_CONFLICT => "WT_PREPARE_CONFLICT: conflict with a prepared update",
        WT_TRY_SALVAGE => "WT_TRY_SALVAGE: database corruption detected",
        c if c > 0 => return Cow::Owned(std::io::Error::from_raw_os_error(c).to_string()),
        c => return Cow::Owned(format!("error return: {c}")),
    };
    Cow::Borrowed(msg)
}
