//! API-server pause gates keyed by (host, scope)
//!
//! Scope is usually a resource key; [`ALL_SCOPES`] pauses every call on a host.
//! Lookup checks the exact scope first and the wildcard second, once, under the
//! gate lock. A gate locked after that check does not catch the call.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

/// Wildcard scope
pub const ALL_SCOPES: &str = "all";

type GateKey = (String, String);

fn gate_key(host: &str, scope: &str) -> GateKey {
    (host.to_string(), scope.to_string())
}

#[derive(Debug, Default)]
pub struct PauseGates {
    gates: Mutex<HashMap<GateKey, watch::Sender<bool>>>,
}

impl PauseGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the gate for (host, scope)
    pub fn pause(&self, host: &str, scope: &str) {
        info!(%host, %scope, "Locking API server pause gate");
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates
            .entry(gate_key(host, scope))
            .or_insert_with(|| watch::channel(false).0)
            .send_replace(true);
    }

    /// Unlock the gate for (host, scope), waking every call parked on it
    ///
    /// Returns whether the gate was locked.
    pub fn resume(&self, host: &str, scope: &str) -> bool {
        let gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        match gates.get(&gate_key(host, scope)) {
            Some(tx) => {
                let was_locked = tx.send_replace(false);
                info!(%host, %scope, was_locked, "Unlocking API server pause gate");
                was_locked
            }
            None => {
                debug!(%host, %scope, "PauseGates::resume: no such gate");
                false
            }
        }
    }

    pub fn is_locked(&self, host: &str, scope: &str) -> bool {
        let gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.get(&gate_key(host, scope)).is_some_and(|tx| *tx.borrow())
    }

    /// Snapshot check for the gate a call on (host, scope) must wait on
    ///
    /// Returns the matched scope and a receiver for that gate's state.
    pub fn locked_gate(&self, host: &str, scope: &str) -> Option<(String, watch::Receiver<bool>)> {
        let gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        [scope, ALL_SCOPES].into_iter().find_map(|candidate| {
            gates
                .get(&gate_key(host, candidate))
                .filter(|tx| *tx.borrow())
                .map(|tx| (candidate.to_string(), tx.subscribe()))
        })
    }

    /// Park the caller while its (host, scope) gate is locked
    ///
    /// Returns the scope it waited on, or None if no gate applied.
    pub async fn wait_if_paused(&self, host: &str, scope: &str) -> Option<String> {
        let (matched, mut rx) = self.locked_gate(host, scope)?;
        info!(%host, %scope, gate = %matched, "Pausing API server call");
        // Senders live in the map for as long as `self`, so this only returns on unlock
        let _ = rx.wait_for(|locked| !*locked).await;
        info!(%host, %scope, gate = %matched, "API server call resumed");
        Some(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_pause_and_resume() {
        let gates = PauseGates::new();
        assert!(!gates.is_locked("host-A", "pods/default/foo"));

        gates.pause("host-A", "pods/default/foo");
        assert!(gates.is_locked("host-A", "pods/default/foo"));
        assert!(!gates.is_locked("host-B", "pods/default/foo"));

        assert!(gates.resume("host-A", "pods/default/foo"));
        assert!(!gates.is_locked("host-A", "pods/default/foo"));
        assert!(!gates.resume("host-A", "pods/default/foo"));
    }

    #[test]
    fn test_wildcard_fallback() {
        let gates = PauseGates::new();
        gates.pause("host-A", ALL_SCOPES);

        let (matched, _) = gates.locked_gate("host-A", "pods/default/foo").unwrap();
        assert_eq!(matched, ALL_SCOPES);
        assert!(gates.locked_gate("host-B", "pods/default/foo").is_none());
    }

    #[test]
    fn test_exact_scope_takes_precedence() {
        let gates = PauseGates::new();
        gates.pause("host-A", ALL_SCOPES);
        gates.pause("host-A", "pods/default/foo");

        let (matched, _) = gates.locked_gate("host-A", "pods/default/foo").unwrap();
        assert_eq!(matched, "pods/default/foo");
    }

    #[test]
    fn test_unlocked_exact_entry_falls_through_to_wildcard() {
        let gates = PauseGates::new();
        gates.pause("host-A", "pods/default/foo");
        gates.resume("host-A", "pods/default/foo");
        gates.pause("host-A", ALL_SCOPES);

        let (matched, _) = gates.locked_gate("host-A", "pods/default/foo").unwrap();
        assert_eq!(matched, ALL_SCOPES);
    }

    #[tokio::test]
    async fn test_wait_if_paused_returns_immediately_when_open() {
        let gates = PauseGates::new();
        let waited = tokio::time::timeout(Duration::from_millis(100), gates.wait_if_paused("host-A", "k"))
            .await
            .unwrap();
        assert!(waited.is_none());
    }

    #[tokio::test]
    async fn test_waiter_on_exact_gate_ignores_wildcard_resume() {
        let gates = Arc::new(PauseGates::new());
        gates.pause("host-A", ALL_SCOPES);
        gates.pause("host-A", "pods/default/foo");

        let waiter = {
            let gates = gates.clone();
            tokio::spawn(async move { gates.wait_if_paused("host-A", "pods/default/foo").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        gates.resume("host-A", ALL_SCOPES);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gates.resume("host-A", "pods/default/foo");
        let matched = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resume")
            .unwrap();
        assert_eq!(matched.as_deref(), Some("pods/default/foo"));
    }
}
