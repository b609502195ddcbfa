//! Simple event bus for decoupled communication between the lifecycle
//! manager and whoever observes it (server log, tests).
//!
//! Handlers run on a multi-threaded runtime, so the queue sits behind a
//! mutex. Events are buffered and drained by the observer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use interview_types::event::SessionEvent;

/// Shared event bus, cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<VecDeque<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Publish an event. Called by the lifecycle manager.
    pub fn emit(&self, event: SessionEvent) {
        self.queue().push_back(event);
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<SessionEvent> {
        self.queue().drain(..).collect()
    }

    // A panic while holding the lock leaves the queue itself intact.
    fn queue(&self) -> MutexGuard<'_, VecDeque<SessionEvent>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
