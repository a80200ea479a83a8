//! NotificationCoordinator - one async handler per instrumented hook
//!
//! Handlers record snapshots, turn reported operations into notifications,
//! and block until the state machine releases them. They always answer
//! `ok`; anything that goes wrong is logged and the call is let through.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

use super::machine::ScenarioStatus;
use super::messages::{
    ApiServerRecvRequest, ControllerGetRequest, ControllerListRequest, ControllerReadPauseRequest,
    ControllerRecvRequest, ControllerWriteRequest, NotifyResponse,
};
use crate::domain::{
    ApiOperation, ChangeKind, DecodeError, INFORMER, InformerOperation, ObservationStage, WriteType, decode_object,
    decode_object_list, encode_object, name_namespace, resource_key, trim_kind_api_version,
};
use crate::gate::{PauseGates, ReadGate};
use crate::mask::FieldMaskRegistry;
use crate::notification::{Notification, NotificationHeader, NotificationKind, UpdatePayload};
use crate::store::{ObjectStateStore, StoreError};

/// Why an update notification could not be built
#[derive(Debug, Error)]
enum PayloadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

pub struct NotificationCoordinator {
    store: ObjectStateStore,
    masks: FieldMaskRegistry,
    read_gate: ReadGate,
    pause_gates: Arc<PauseGates>,
    tx: mpsc::Sender<Notification>,
    /// Next sequence number; held across the send so numbers follow enqueue order
    next_seq: Mutex<u64>,
    release_timeout: Option<Duration>,
    timed_out_releases: AtomicU64,
    status_rx: watch::Receiver<ScenarioStatus>,
}

impl NotificationCoordinator {
    pub(crate) fn new(
        masks: FieldMaskRegistry,
        read_gate: ReadGate,
        pause_gates: Arc<PauseGates>,
        tx: mpsc::Sender<Notification>,
        release_timeout: Option<Duration>,
        status_rx: watch::Receiver<ScenarioStatus>,
    ) -> Self {
        Self {
            store: ObjectStateStore::new(),
            masks,
            read_gate,
            pause_gates,
            tx,
            next_seq: Mutex::new(0),
            release_timeout,
            timed_out_releases: AtomicU64::new(0),
            status_rx,
        }
    }

    pub fn store(&self) -> &ObjectStateStore {
        &self.store
    }

    pub fn pause_gates(&self) -> &PauseGates {
        &self.pause_gates
    }

    pub fn read_gate(&self) -> &ReadGate {
        &self.read_gate
    }

    /// Latest scenario status published by the state machine
    ///
    /// The timed-out release count is read live, since a stuck machine stops
    /// publishing.
    pub fn status(&self) -> ScenarioStatus {
        let mut status = self.status_rx.borrow().clone();
        status.timed_out_releases = self.timed_out_releases.load(Ordering::Relaxed);
        status
    }

    pub async fn notify_before_api_server_recv(&self, req: ApiServerRecvRequest) -> NotifyResponse {
        self.api_server_recv(ObservationStage::BeforeApiServerRecv, req).await
    }

    pub async fn notify_after_api_server_recv(&self, req: ApiServerRecvRequest) -> NotifyResponse {
        self.api_server_recv(ObservationStage::AfterApiServerRecv, req).await
    }

    pub async fn notify_before_controller_recv(&self, req: ControllerRecvRequest) -> NotifyResponse {
        self.controller_recv(ObservationStage::BeforeControllerRecv, req).await
    }

    pub async fn notify_after_controller_recv(&self, req: ControllerRecvRequest) -> NotifyResponse {
        self.controller_recv(ObservationStage::AfterControllerRecv, req).await
    }

    /// Record a read result as the reconciler's write-side baseline
    pub async fn notify_after_controller_get(&self, req: ControllerGetRequest) -> NotifyResponse {
        debug!(reconciler = %req.reconciler_type, resource_key = %req.resource_key, "notify_after_controller_get: called");
        let stage = ObservationStage::AfterControllerWrite;
        self.store.initialize(&req.reconciler_type, stage, &req.resource_key);
        self.record(&req.reconciler_type, stage, &req.resource_key, req.object);
        NotifyResponse::ok()
    }

    /// Record every listed item as the reconciler's write-side baseline
    pub async fn notify_after_controller_list(&self, req: ControllerListRequest) -> NotifyResponse {
        debug!(reconciler = %req.reconciler_type, resource_type = %req.resource_type, "notify_after_controller_list: called");
        let items = match decode_object_list(&req.object_list) {
            Ok(items) => items,
            Err(e) => {
                warn!(reconciler = %req.reconciler_type, resource_type = %req.resource_type, error = %e, "Skipping malformed list");
                return NotifyResponse::ok();
            }
        };

        let stage = ObservationStage::AfterControllerWrite;
        for item in &items {
            let (name, namespace) = name_namespace(item);
            let key = resource_key(&req.resource_type, &namespace, &name);
            self.store.initialize(&req.reconciler_type, stage, &key);
            self.record(&req.reconciler_type, stage, &key, encode_object(item));
        }
        debug!(count = items.len(), "notify_after_controller_list: recorded items");
        NotifyResponse::ok()
    }

    pub async fn notify_after_controller_write(&self, req: ControllerWriteRequest) -> NotifyResponse {
        debug!(
            reconciler = %req.reconciler_type,
            write_type = %req.write_type,
            resource_key = %req.resource_key,
            "notify_after_controller_write: called"
        );
        let stage = ObservationStage::AfterControllerWrite;
        self.store.initialize(&req.reconciler_type, stage, &req.resource_key);

        match req.write_type.parse::<WriteType>() {
            Ok(write) => {
                self.notify(&req.reconciler_type, stage, &req.resource_key, write.into(), &req.object, true)
                    .await;
            }
            Err(e) => warn!(resource_key = %req.resource_key, error = %e, "Skipping notification"),
        }

        self.record(&req.reconciler_type, stage, &req.resource_key, req.object);
        NotifyResponse::ok()
    }

    pub async fn notify_before_controller_read_pause(&self, req: ControllerReadPauseRequest) -> NotifyResponse {
        debug!(
            resource_key = %req.resource_key,
            resource_type = %req.resource_type,
            use_resource_key = req.use_resource_key,
            "notify_before_controller_read_pause: called"
        );
        self.read_gate.acquire().await;
        NotifyResponse::ok()
    }

    pub async fn notify_after_controller_read_pause(&self, req: ControllerReadPauseRequest) -> NotifyResponse {
        debug!(
            resource_key = %req.resource_key,
            resource_type = %req.resource_type,
            use_resource_key = req.use_resource_key,
            "notify_after_controller_read_pause: called"
        );
        self.read_gate.release();
        NotifyResponse::ok()
    }

    async fn api_server_recv(&self, stage: ObservationStage, req: ApiServerRecvRequest) -> NotifyResponse {
        debug!(
            host = %req.host,
            operation = %req.operation_type,
            resource_key = %req.resource_key,
            %stage,
            "api_server_recv: called"
        );
        self.store.initialize(&req.host, stage, &req.resource_key);

        match req.operation_type.parse::<ApiOperation>() {
            Ok(op) => {
                self.notify(&req.host, stage, &req.resource_key, op.into(), &req.object, false)
                    .await;
            }
            Err(e) => warn!(host = %req.host, resource_key = %req.resource_key, error = %e, "Skipping notification"),
        }

        self.record(&req.host, stage, &req.resource_key, req.object);
        self.pause_gates.wait_if_paused(&req.host, &req.resource_key).await;
        NotifyResponse::ok()
    }

    async fn controller_recv(&self, stage: ObservationStage, req: ControllerRecvRequest) -> NotifyResponse {
        debug!(
            operation = %req.operation_type,
            resource_key = %req.resource_key,
            %stage,
            "controller_recv: called"
        );
        self.store.initialize(INFORMER, stage, &req.resource_key);

        match req.operation_type.parse::<InformerOperation>() {
            Ok(op) => {
                self.notify(INFORMER, stage, &req.resource_key, op.into(), &req.object, false)
                    .await;
            }
            Err(e) => warn!(resource_key = %req.resource_key, error = %e, "Skipping notification"),
        }

        self.record(INFORMER, stage, &req.resource_key, req.object);
        NotifyResponse::ok()
    }

    /// Build the notification for one classified operation and wait for its release
    async fn notify(
        &self,
        observer: &str,
        stage: ObservationStage,
        key: &str,
        change: ChangeKind,
        object: &str,
        trim: bool,
    ) {
        let kind = match change {
            ChangeKind::Create => NotificationKind::Create,
            ChangeKind::Delete => NotificationKind::Delete,
            ChangeKind::Update => match self.update_payload(observer, stage, key, object, trim) {
                Ok(payload) => NotificationKind::Update(payload),
                Err(e) => {
                    warn!(%observer, %stage, resource_key = %key, error = %e, "Skipping update notification");
                    return;
                }
            },
        };
        self.send_and_block(observer, stage, key, kind).await;
    }

    fn update_payload(
        &self,
        observer: &str,
        stage: ObservationStage,
        key: &str,
        object: &str,
        trim: bool,
    ) -> Result<UpdatePayload, PayloadError> {
        let prev = self.store.read(observer, stage, key)?;
        let mut prev_state = decode_object(&prev)?;
        let mut cur_state = decode_object(object)?;
        if trim {
            trim_kind_api_version(&mut prev_state);
            trim_kind_api_version(&mut cur_state);
        }
        Ok(UpdatePayload {
            prev_state,
            cur_state,
            masks: self.masks.for_resource_key(key),
        })
    }

    async fn send_and_block(&self, observer: &str, stage: ObservationStage, key: &str, kind: NotificationKind) {
        let change = kind.change();
        let (seq, wait) = {
            let mut next_seq = self.next_seq.lock().await;
            let seq = *next_seq;
            let header = NotificationHeader {
                seq,
                resource_key: key.to_string(),
                observation_stage: stage,
                observer: observer.to_string(),
            };
            let (notification, wait) = Notification::new(header, kind);

            debug!(seq, %observer, %stage, resource_key = %key, %change, "Sending notification");
            if self.tx.send(notification).await.is_err() {
                error!(seq, "Scenario state machine has stopped, not blocking");
                return;
            }
            *next_seq += 1;
            (seq, wait)
        };

        let released = match self.release_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(released) => released,
                Err(_) => {
                    let total = self.timed_out_releases.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        seq,
                        resource_key = %key,
                        timeout_ms = limit.as_millis() as u64,
                        timed_out_releases = total,
                        "Release timed out, letting call through; the scenario did not hold"
                    );
                    return;
                }
            },
            None => wait.await,
        };

        match released {
            Ok(()) => info!(seq, %observer, %stage, resource_key = %key, %change, "Notification released"),
            Err(_) => warn!(seq, "Notification dropped without release"),
        }
    }

    fn record(&self, observer: &str, stage: ObservationStage, key: &str, object: String) {
        if let Err(e) = self.store.write(observer, stage, key, object) {
            warn!(%observer, %stage, resource_key = %key, error = %e, "Failed to record state");
        }
    }
}
