//! # wtbind testkit
//!
//! Test utilities for wtbind.
//!
//! This crate provides:
//! - Temporary engine homes and pre-populated tables
//! - Property-based test generators using proptest
//! - Tracing output for tests, filtered by `RUST_LOG`
//!
//! ## Usage
//!
//! ```rust
//! use wtbind_testkit::prelude::*;
//!
//! with_temp_home(|conn| {
//!     let session = conn.open_session(None).unwrap();
//!     session.create("table:t", None).unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use fixtures::*;
pub use generators::*;

/// Installs a `tracing` subscriber writing to the test harness.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Safe to call
/// from every test: only the first call installs anything.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
