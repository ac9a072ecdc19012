//! Process-wide stop signal.
//!
//! One `Shutdown` is cloned into the accept loop, every connection handler
//! and the credential refresher; `trigger` wakes all of them at once.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn trigger(&self) {
        *self.flag() = true;
        self.inner.1.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag()
    }

    /// sleeps up to `timeout`, returns `true` as soon as shutdown is triggered
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = self.flag();
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            triggered = self
                .inner
                .1
                .wait_timeout(triggered, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}
