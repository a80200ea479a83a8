//! ScenarioStateMachine - the single consumer of the notification queue
//!
//! Notifications are evaluated one at a time in enqueue order against the plan
//! step at the cursor. Every notification is released exactly once, after its
//! evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::action::ActionContext;
use super::history::HistoryEntry;
use crate::notification::Notification;
use crate::plan::{Step, TestPlan};

/// Progress of the running scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStatus {
    pub total_steps: usize,
    pub consumed_steps: usize,
    pub notifications_processed: u64,
    pub pending_async_actions: usize,
    /// Calls let through because their release timed out; counted by the coordinator
    #[serde(default)]
    pub timed_out_releases: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScenarioStatus {
    pub fn new(total_steps: usize) -> Self {
        let now = Utc::now();
        Self {
            total_steps,
            consumed_steps: 0,
            notifications_processed: 0,
            pending_async_actions: 0,
            timed_out_releases: 0,
            started_at: now,
            completed_at: (total_steps == 0).then_some(now),
        }
    }

    /// All plan steps have fired
    pub fn is_complete(&self) -> bool {
        self.consumed_steps >= self.total_steps
    }
}

/// Completion signal of an asynchronous action
#[derive(Debug)]
struct AsyncDone {
    step: usize,
    result: Result<(), String>,
}

pub struct ScenarioStateMachine {
    plan: TestPlan,
    cursor: usize,
    /// Matches seen so far for the step at the cursor
    occurrences: u32,
    rx: mpsc::Receiver<Notification>,
    done_tx: mpsc::UnboundedSender<AsyncDone>,
    done_rx: mpsc::UnboundedReceiver<AsyncDone>,
    pending_async: usize,
    max_pending: usize,
    ctx: ActionContext,
    status: ScenarioStatus,
    status_tx: watch::Sender<ScenarioStatus>,
    history_tx: broadcast::Sender<HistoryEntry>,
}

impl ScenarioStateMachine {
    pub fn new(
        plan: TestPlan,
        rx: mpsc::Receiver<Notification>,
        ctx: ActionContext,
        max_pending: usize,
        status_tx: watch::Sender<ScenarioStatus>,
        history_tx: broadcast::Sender<HistoryEntry>,
    ) -> Self {
        debug!(steps = plan.len(), max_pending, "ScenarioStateMachine::new: called");
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let status = ScenarioStatus::new(plan.len());
        status_tx.send_replace(status.clone());
        Self {
            plan,
            cursor: 0,
            occurrences: 0,
            rx,
            done_tx,
            done_rx,
            pending_async: 0,
            max_pending: max_pending.max(1),
            ctx,
            status,
            status_tx,
            history_tx,
        }
    }

    /// Run until every producer handle has been dropped
    pub async fn run(mut self) {
        info!(steps = self.plan.len(), "ScenarioStateMachine started");

        while let Some(notification) = self.rx.recv().await {
            self.drain_completions();
            self.process(notification).await;
        }

        info!(
            processed = self.status.notifications_processed,
            consumed = self.cursor,
            pending_async = self.pending_async,
            "ScenarioStateMachine stopped"
        );
    }

    async fn process(&mut self, mut notification: Notification) {
        let fired = self.evaluate(&notification);
        let entry = HistoryEntry::new(notification.header.clone(), notification.kind.change(), fired);
        let _ = self.history_tx.send(entry);

        match fired {
            None => {
                notification.release();
            }
            Some(index) => {
                let step = self.plan.steps[index].clone();
                info!(
                    step = %step.label(index),
                    seq = notification.header.seq,
                    resource_key = %notification.header.resource_key,
                    stage = %notification.header.observation_stage,
                    action = %step.action.kind,
                    is_async = step.action.is_async,
                    "Trigger fired"
                );
                self.advance();

                if step.action.is_async {
                    self.spawn_async(index, step);
                    notification.release();
                    self.wait_for_async_capacity().await;
                } else {
                    if let Err(e) = self.ctx.execute(&step.action.kind).await {
                        warn!(step = %step.label(index), error = %e, "Action failed");
                    }
                    notification.release();
                }
            }
        }

        self.status.notifications_processed += 1;
        self.publish_status();
    }

    /// Index of the step that fires on this notification, if any
    fn evaluate(&mut self, notification: &Notification) -> Option<usize> {
        let step = self.plan.steps.get(self.cursor)?;
        if !step.trigger.matches(notification) {
            return None;
        }
        self.occurrences += 1;
        if self.occurrences < step.trigger.occurrence {
            debug!(
                step = %step.label(self.cursor),
                seen = self.occurrences,
                needed = step.trigger.occurrence,
                "ScenarioStateMachine::evaluate: matched, occurrence not reached"
            );
            return None;
        }
        Some(self.cursor)
    }

    fn advance(&mut self) {
        self.cursor += 1;
        self.occurrences = 0;
        self.status.consumed_steps = self.cursor;
        if self.cursor == self.plan.len() {
            self.status.completed_at = Some(Utc::now());
            info!(steps = self.plan.len(), "Test plan completed, passing remaining notifications through");
        }
    }

    fn spawn_async(&mut self, index: usize, step: Step) {
        let ctx = self.ctx.clone();
        let done_tx = self.done_tx.clone();
        self.pending_async += 1;
        tokio::spawn(async move {
            let result = ctx.execute(&step.action.kind).await.map_err(|e| e.to_string());
            // The machine owns a sender too, so this fails only once it is gone
            let _ = done_tx.send(AsyncDone { step: index, result });
        });
    }

    async fn wait_for_async_capacity(&mut self) {
        while self.pending_async >= self.max_pending {
            self.publish_status();
            debug!(pending = self.pending_async, "ScenarioStateMachine: waiting for async action");
            match self.done_rx.recv().await {
                Some(done) => self.complete_async(done),
                None => break,
            }
        }
    }

    fn drain_completions(&mut self) {
        while let Ok(done) = self.done_rx.try_recv() {
            self.complete_async(done);
        }
    }

    fn complete_async(&mut self, done: AsyncDone) {
        self.pending_async = self.pending_async.saturating_sub(1);
        match done.result {
            Ok(()) => debug!(step = done.step, "Async action completed"),
            Err(e) => warn!(step = done.step, error = %e, "Async action failed"),
        }
    }

    fn publish_status(&mut self) {
        self.status.pending_async_actions = self.pending_async;
        self.status_tx.send_replace(self.status.clone());
    }
}
