//! Plan action execution

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ClusterConfig;
use crate::gate::{PauseGates, ReadGate};
use crate::plan::ActionKind;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("external action {name} failed: {reason}")]
    External { name: String, reason: String },
}

/// Runs `external` plan actions
///
/// Gate actions are handled by the coordinator itself; anything that reaches
/// outside the process (restarting a controller, crashing a node) goes here.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: &Value, cluster: &ClusterConfig) -> Result<(), ActionError>;
}

/// Executor that only records the request
#[derive(Debug, Default)]
pub struct LoggingExecutor;

#[async_trait]
impl ActionExecutor for LoggingExecutor {
    async fn execute(&self, name: &str, args: &Value, cluster: &ClusterConfig) -> Result<(), ActionError> {
        info!(%name, %args, namespace = %cluster.namespace, "External action requested (logging only)");
        Ok(())
    }
}

/// Everything an action may touch
#[derive(Clone)]
pub struct ActionContext {
    pub cluster: ClusterConfig,
    pub pause_gates: Arc<PauseGates>,
    pub read_gate: ReadGate,
    pub executor: Arc<dyn ActionExecutor>,
}

impl ActionContext {
    pub fn new(
        cluster: ClusterConfig,
        pause_gates: Arc<PauseGates>,
        read_gate: ReadGate,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            cluster,
            pause_gates,
            read_gate,
            executor,
        }
    }

    pub async fn execute(&self, action: &ActionKind) -> Result<(), ActionError> {
        debug!(%action, "ActionContext::execute: called");
        match action {
            ActionKind::PauseApiServer {
                api_server_name,
                pause_scope,
            } => {
                let host = self.cluster.resolve_api_server(api_server_name);
                self.pause_gates.pause(host, pause_scope);
            }
            ActionKind::ResumeApiServer {
                api_server_name,
                pause_scope,
            } => {
                let host = self.cluster.resolve_api_server(api_server_name);
                self.pause_gates.resume(host, pause_scope);
            }
            ActionKind::PauseControllerRead => self.read_gate.acquire().await,
            ActionKind::ResumeControllerRead => {
                self.read_gate.release();
            }
            ActionKind::External { name, args } => {
                self.executor.execute(name, args, &self.cluster).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records external actions and optionally fails them
    #[derive(Debug, Default)]
    pub struct RecordingExecutor {
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
    }

    #[async_trait]
    impl ActionExecutor for RecordingExecutor {
        async fn execute(&self, name: &str, _args: &Value, _cluster: &ClusterConfig) -> Result<(), ActionError> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.fail {
                return Err(ActionError::External {
                    name: name.to_string(),
                    reason: "mock failure".to_string(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingExecutor;
    use super::*;
    use crate::gate::ALL_SCOPES;
    use serde_json::json;

    fn context(executor: Arc<dyn ActionExecutor>) -> ActionContext {
        ActionContext::new(
            ClusterConfig::default(),
            Arc::new(PauseGates::new()),
            ReadGate::new(),
            executor,
        )
    }

    #[tokio::test]
    async fn test_pause_resolves_alias() {
        let ctx = context(Arc::new(LoggingExecutor));
        ctx.execute(&ActionKind::PauseApiServer {
            api_server_name: "following".to_string(),
            pause_scope: ALL_SCOPES.to_string(),
        })
        .await
        .unwrap();
        assert!(ctx.pause_gates.is_locked("kind-control-plane3", ALL_SCOPES));

        ctx.execute(&ActionKind::ResumeApiServer {
            api_server_name: "kind-control-plane3".to_string(),
            pause_scope: ALL_SCOPES.to_string(),
        })
        .await
        .unwrap();
        assert!(!ctx.pause_gates.is_locked("kind-control-plane3", ALL_SCOPES));
    }

    #[tokio::test]
    async fn test_read_gate_actions() {
        let ctx = context(Arc::new(LoggingExecutor));
        ctx.execute(&ActionKind::PauseControllerRead).await.unwrap();
        assert!(ctx.read_gate.is_held());
        ctx.execute(&ActionKind::ResumeControllerRead).await.unwrap();
        assert!(!ctx.read_gate.is_held());
    }

    #[tokio::test]
    async fn test_external_action_errors_propagate() {
        let executor = Arc::new(RecordingExecutor {
            fail: true,
            ..Default::default()
        });
        let ctx = context(executor.clone());
        let err = ctx
            .execute(&ActionKind::External {
                name: "crashNode".to_string(),
                args: json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::External { .. }));
        assert_eq!(*executor.calls.lock().unwrap(), vec!["crashNode".to_string()]);
    }
}
