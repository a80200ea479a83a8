//! TestCoordinator - wires the handlers, the gates, and the state machine together

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::action::{ActionContext, ActionExecutor};
use super::config::CoordinatorConfig;
use super::handlers::NotificationCoordinator;
use super::history::HistoryEntry;
use super::machine::{ScenarioStateMachine, ScenarioStatus};
use crate::config::ClusterConfig;
use crate::gate::{PauseGates, ReadGate};
use crate::mask::FieldMaskRegistry;
use crate::plan::TestPlan;

/// One test run's coordinator, before it starts
pub struct TestCoordinator {
    config: CoordinatorConfig,
    cluster: ClusterConfig,
    plan: TestPlan,
    masks: FieldMaskRegistry,
    executor: Arc<dyn ActionExecutor>,
    history_tx: broadcast::Sender<HistoryEntry>,
}

impl TestCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        cluster: ClusterConfig,
        plan: TestPlan,
        masks: FieldMaskRegistry,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        debug!(steps = plan.len(), ?config, "TestCoordinator::new: called");
        let (history_tx, _) = broadcast::channel(config.history_capacity.max(1));
        Self {
            config,
            cluster,
            plan,
            masks,
            executor,
            history_tx,
        }
    }

    /// Receive one entry per evaluated notification
    ///
    /// Subscribe before `start` to see every entry.
    pub fn subscribe_history(&self) -> broadcast::Receiver<HistoryEntry> {
        self.history_tx.subscribe()
    }

    /// Spawn the state machine and return the handler facade
    ///
    /// The machine stops once the returned coordinator and all its clones are
    /// dropped.
    pub fn start(self) -> (Arc<NotificationCoordinator>, JoinHandle<()>) {
        info!(
            steps = self.plan.len(),
            channel_capacity = self.config.channel_capacity,
            max_pending_async_actions = self.config.max_pending_async_actions,
            namespace = %self.cluster.namespace,
            "Starting test coordinator"
        );
        info!(masked_types = ?self.masks.resource_types(), "Field masks loaded");
        for resource_type in self.masks.resource_types() {
            debug!(%resource_type, masks = ?self.masks.for_resource_type(resource_type), "Field mask");
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let read_gate = ReadGate::new();
        let pause_gates = Arc::new(PauseGates::new());
        let (status_tx, status_rx) = watch::channel(ScenarioStatus::new(self.plan.len()));

        let ctx = ActionContext::new(self.cluster, pause_gates.clone(), read_gate.clone(), self.executor);
        let machine = ScenarioStateMachine::new(
            self.plan,
            rx,
            ctx,
            self.config.max_pending_async_actions,
            status_tx,
            self.history_tx,
        );
        let handle = tokio::spawn(machine.run());

        let coordinator = NotificationCoordinator::new(
            self.masks,
            read_gate,
            pause_gates,
            tx,
            self.config.release_timeout(),
            status_rx,
        );
        (Arc::new(coordinator), handle)
    }
}
