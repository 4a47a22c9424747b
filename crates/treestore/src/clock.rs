//! Edit stamps.
//!
//! Every node carries the stamp of the session that last wrote it. The stamp
//! is supplied from outside the core; [`SessionClock`] is a simple
//! monotonic source that starts a new stamp per session.

use std::sync::atomic::{AtomicU32, Ordering};

/// Supplier of the current edit stamp.
pub trait StampSource: Send + Sync {
    /// Stamp to apply to nodes written now.
    fn current_stamp(&self) -> u32;
}

/// Monotonic session counter.
#[derive(Debug)]
pub struct SessionClock {
    stamp: AtomicU32,
}

impl SessionClock {
    /// Start counting from `stamp`.
    pub fn starting_at(stamp: u32) -> Self {
        Self {
            stamp: AtomicU32::new(stamp),
        }
    }

    /// Open a new session and return its stamp.
    pub fn begin_session(&self) -> u32 {
        self.stamp.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl StampSource for SessionClock {
    fn current_stamp(&self) -> u32 {
        self.stamp.load(Ordering::SeqCst)
    }
}
