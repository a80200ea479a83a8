//! ObjectStateStore - last-seen object state per observer, stage, and resource
//!
//! One map keyed by the composite `(observer, stage, resource_key)` tuple,
//! guarded by a single reader/writer lock. Each operation is atomic on its
//! own; a read followed by a write is not.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::domain::ObservationStage;

/// Value of an entry before anything was written to it
pub const EMPTY_STATE: &str = "{}";

/// Composite key of one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub observer: String,
    pub stage: ObservationStage,
    pub resource_key: String,
}

impl StateKey {
    pub fn new(observer: &str, stage: ObservationStage, resource_key: &str) -> Self {
        Self {
            observer: observer.to_string(),
            stage,
            resource_key: resource_key.to_string(),
        }
    }
}

/// Errors from store access
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("state entry {observer}/{stage}/{resource_key} was never initialized")]
    NotInitialized {
        observer: String,
        stage: ObservationStage,
        resource_key: String,
    },
}

impl From<StateKey> for StoreError {
    fn from(key: StateKey) -> Self {
        Self::NotInitialized {
            observer: key.observer,
            stage: key.stage,
            resource_key: key.resource_key,
        }
    }
}

/// Thread-safe snapshot table
#[derive(Debug, Default)]
pub struct ObjectStateStore {
    states: RwLock<HashMap<StateKey, String>>,
}

impl ObjectStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry with `{}` if it is absent; never overwrites
    pub fn initialize(&self, observer: &str, stage: ObservationStage, resource_key: &str) {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states
            .entry(StateKey::new(observer, stage, resource_key))
            .or_insert_with(|| {
                debug!(%observer, %stage, %resource_key, "ObjectStateStore::initialize: new entry");
                EMPTY_STATE.to_string()
            });
    }

    /// Read an initialized entry
    pub fn read(&self, observer: &str, stage: ObservationStage, resource_key: &str) -> Result<String, StoreError> {
        let key = StateKey::new(observer, stage, resource_key);
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states.get(&key).cloned().ok_or_else(|| key.into())
    }

    /// Overwrite an initialized entry
    pub fn write(
        &self,
        observer: &str,
        stage: ObservationStage,
        resource_key: &str,
        value: impl Into<String>,
    ) -> Result<(), StoreError> {
        let key = StateKey::new(observer, stage, resource_key);
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        match states.get_mut(&key) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(key.into()),
        }
    }

    /// Number of initialized entries
    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
