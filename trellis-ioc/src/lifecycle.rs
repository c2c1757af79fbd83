//! Per-instance lifecycle state and the graceful shutdown sweep.
//!
//! Every cached instance moves through `created -> injecting -> constructed` and, during
//! graceful shutdown, to `stopped`. The state is carried by a [Readiness] signal shared between
//! the bean store entry and whichever task drives construction, so callers can await completion
//! of a lazily-constructed bean instead of racing the fixed delay.

use crate::bean_store::BeanStore;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Delay between storing a lazy bean's placeholder and starting its injection/construction.
pub const LAZY_INIT_DELAY: Duration = Duration::from_millis(200);

/// Lifecycle state of a cached instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BeanState {
    /// Zero-value instantiated and visible in the store as a placeholder.
    Created,
    /// Field injection in progress.
    Injecting,
    /// Construction hook returned successfully; the instance is fully usable.
    Constructed,
    /// Shutdown hook has run.
    Stopped,
}

/// Completion signal for an instance's construction. A lazy bean's placeholder is observable
/// before injection finishes; waiting on its readiness is the supported way to require a fully
/// constructed instance.
#[derive(Debug)]
pub struct Readiness {
    state: Mutex<BeanState>,
    signal: Condvar,
}

impl Readiness {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(BeanState::Created),
            signal: Condvar::new(),
        }
    }

    pub(crate) fn advance(&self, state: BeanState) {
        let mut current = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = state;
        drop(current);
        self.signal.notify_all();
    }

    pub fn state(&self) -> BeanState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == BeanState::Constructed
    }

    /// Blocks until the instance reaches [BeanState::Constructed]. In-flight construction has no
    /// cancellation or timeout, so this can block indefinitely on a stalled construction hook.
    pub fn wait(&self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        while *state != BeanState::Constructed {
            state = match self.signal.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Waits until the instance reaches [BeanState::Constructed], up to the given timeout.
    /// Returns whether the instance is ready. A stopped instance never becomes ready again.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        while *state != BeanState::Constructed {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let (guard, result) = match self.signal.wait_timeout(state, deadline - now) {
                Ok(outcome) => outcome,
                Err(poisoned) => poisoned.into_inner(),
            };
            state = guard;

            if result.timed_out() && *state != BeanState::Constructed {
                return false;
            }
        }

        true
    }
}

/// Graceful shutdown sweep: invokes every cached instance's shutdown hook exactly once (order
/// unspecified), then clears the store so subsequent lookups reconstruct fresh instances.
pub(crate) fn sweep(store: &BeanStore) {
    let snapshot = store.snapshot();
    info!("Stopping {} bean(s).", snapshot.len());

    for bean in &snapshot {
        debug!("Stopping bean [{}].", bean.bean_name);
        bean.stop();
        bean.readiness.advance(BeanState::Stopped);
    }

    store.clear();
}
