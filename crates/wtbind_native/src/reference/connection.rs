//! Connection handle of the reference engine.

use super::session::{parse_isolation, Isolation, RefSession};
use super::{rejected, Shared};
use crate::backend::{NativeConnection, NativeSession};
use crate::codes::{EBUSY, EINVAL, ENOMEM};
use crate::grammar::ParsedConfig;
use std::ffi::c_int;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const CLOSE_KEYS: &[&str] = &["leak_memory", "use_timestamp"];
const SESSION_KEYS: &[&str] = &["isolation"];

pub(crate) struct RefConnection {
    shared: Arc<Shared>,
    closed: bool,
}

impl RefConnection {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            closed: false,
        }
    }
}

// SAFETY: sessions opened here are `RefSession`s.
unsafe impl NativeConnection for RefConnection {
    fn close(&mut self, config: Option<&str>) -> c_int {
        if self.closed {
            return EINVAL;
        }
        let config = match ParsedConfig::parse(config) {
            Ok(c) => c,
            Err(e) => return rejected(e),
        };
        if let Err(e) = config.check_allowed(CLOSE_KEYS) {
            return rejected(e);
        }
        if self.shared.sessions.load(Ordering::SeqCst) > 0 {
            return EBUSY;
        }

        // A panicked engine's rows are not checkpointed again.
        let rc = match self.shared.check_panic() {
            0 => self.shared.checkpoint(),
            rc => rc,
        };
        self.shared.release_home();
        self.closed = true;
        rc
    }

    fn open_session(&self, config: Option<&str>) -> Result<Box<dyn NativeSession>, c_int> {
        if self.closed {
            return Err(EINVAL);
        }
        match self.shared.check_panic() {
            0 => {}
            rc => return Err(rc),
        }
        let config = ParsedConfig::parse(config).map_err(rejected)?;
        config.check_allowed(SESSION_KEYS).map_err(rejected)?;
        let isolation = parse_isolation(&config)?.unwrap_or(Isolation::Snapshot);

        let opened = self
            .shared
            .sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.shared.session_max).then_some(n + 1)
            });
        if opened.is_err() {
            return Err(ENOMEM);
        }
        Ok(Box::new(RefSession::new(Arc::clone(&self.shared), isolation)))
    }
}
