//! Controller read gate
//!
//! A single binary gate. The controller acquires it before a read and releases
//! it after; plan actions acquire it to hold controller reads back. Acquire and
//! release arrive on different calls, so the held flag lives inside the gate
//! and is only ever flipped under its lock.

use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Inner {
    held: Mutex<bool>,
    notify: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct ReadGate {
    inner: Arc<Inner>,
}

impl ReadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the gate is free, then hold it
    pub async fn acquire(&self) {
        debug!("ReadGate::acquire: waiting");
        loop {
            // Register before checking so a release in between is not missed
            let mut notified = pin!(self.inner.notify.notified());
            notified.as_mut().enable();
            if self.try_take() {
                debug!("ReadGate::acquire: held");
                return;
            }
            notified.await;
        }
    }

    fn try_take(&self) -> bool {
        let mut held = self.inner.held.lock().unwrap_or_else(PoisonError::into_inner);
        if *held {
            return false;
        }
        *held = true;
        true
    }

    /// Free the gate; returns false if it was not held
    pub fn release(&self) -> bool {
        let mut held = self.inner.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !*held {
            warn!("ReadGate::release: gate was not held, ignoring");
            return false;
        }
        *held = false;
        drop(held);
        self.inner.notify.notify_waiters();
        debug!("ReadGate::release: released");
        true
    }

    pub fn is_held(&self) -> bool {
        *self.inner.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
