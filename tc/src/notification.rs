//! Notifications passed from the RPC handlers to the scenario state machine
//!
//! Every notification carries a single-use release signal. The handler that
//! produced it waits on the paired receiver; the state machine resolves the
//! signal exactly once after it has evaluated the notification.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::domain::{ChangeKind, ObjectMap, ObservationStage};
use crate::mask::MaskSet;

/// Receiver a handler blocks on until its notification is released
pub type ReleaseWait = oneshot::Receiver<()>;

/// Identity shared by every notification variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHeader {
    /// Enqueue-time sequence number, for log correlation
    pub seq: u64,
    pub resource_key: String,
    pub observation_stage: ObservationStage,
    pub observer: String,
}

/// Update payload: decoded states plus the masks for the resource's type
#[derive(Debug, Clone, Default)]
pub struct UpdatePayload {
    pub prev_state: ObjectMap,
    pub cur_state: ObjectMap,
    pub masks: MaskSet,
}

#[derive(Debug, Clone)]
pub enum NotificationKind {
    Create,
    Update(UpdatePayload),
    Delete,
}

impl NotificationKind {
    pub fn change(&self) -> ChangeKind {
        match self {
            Self::Create => ChangeKind::Create,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete => ChangeKind::Delete,
        }
    }
}

#[derive(Debug)]
pub struct Notification {
    pub header: NotificationHeader,
    pub kind: NotificationKind,
    release: Option<oneshot::Sender<()>>,
}

impl Notification {
    /// Create a notification and the receiver its producer waits on
    pub fn new(header: NotificationHeader, kind: NotificationKind) -> (Self, ReleaseWait) {
        let (tx, rx) = oneshot::channel();
        let notification = Self {
            header,
            kind,
            release: Some(tx),
        };
        (notification, rx)
    }

    /// Unblock the producer; a second call is ignored and returns false
    pub fn release(&mut self) -> bool {
        let Some(tx) = self.release.take() else {
            warn!(seq = self.header.seq, "Notification::release: already released");
            return false;
        };
        if tx.send(()).is_err() {
            // Producer gave up waiting (release timeout); the release still counts
            debug!(seq = self.header.seq, "Notification::release: producer no longer waiting");
        }
        true
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}
