//! Test plan: an ordered list of trigger -> action steps
//!
//! Plans are YAML documents:
//!
//! ```yaml
//! steps:
//!   - trigger:
//!       when: afterControllerWrite
//!       by: deployment-reconciler
//!       condition:
//!         type: onObjectUpdate
//!         resourceKey: deployments/default/web
//!         curStateDiff: {spec: {replicas: 3}}
//!     action:
//!       type: pauseAPIServer
//!       apiServerName: following
//!       pauseScope: all
//! ```

mod trigger;

pub use trigger::payload_diff;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::ObservationStage;
use crate::gate::ALL_SCOPES;

/// Errors from loading or validating a plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read test plan {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse test plan: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("step {step}: {reason}")]
    Invalid { step: usize, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Optional label used in logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub trigger: Trigger,
    pub action: Action,
}

impl Step {
    /// Label for logs: the name if set, otherwise the 1-based position
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("step-{}", index + 1))
    }
}

fn default_occurrence() -> u32 {
    1
}

/// Predicate over notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    /// Observation stage the notification must come from
    pub when: ObservationStage,

    /// Observer that must have reported it; any observer if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,

    /// Fire on the n-th matching notification
    #[serde(default = "default_occurrence")]
    pub occurrence: u32,

    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
    #[serde(rename_all = "camelCase")]
    OnObjectCreate { resource_key: String },

    #[serde(rename_all = "camelCase")]
    OnObjectDelete { resource_key: String },

    /// Any update whose masked diff contains the given patterns
    #[serde(rename_all = "camelCase")]
    OnObjectUpdate {
        resource_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prev_state_diff: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cur_state_diff: Option<Value>,
        #[serde(default, rename = "convertStateToAPIForm")]
        convert_state_to_api_form: bool,
    },

    /// An update that changes at least one unmasked field
    #[serde(rename_all = "camelCase")]
    OnAnyFieldModification {
        resource_key: String,
        #[serde(default, rename = "convertStateToAPIForm")]
        convert_state_to_api_form: bool,
    },

    /// An update that changes nothing outside the mask
    #[serde(rename_all = "camelCase")]
    OnNoOpUpdate { resource_key: String },
}

impl Condition {
    pub fn resource_key(&self) -> &str {
        match self {
            Self::OnObjectCreate { resource_key }
            | Self::OnObjectDelete { resource_key }
            | Self::OnObjectUpdate { resource_key, .. }
            | Self::OnAnyFieldModification { resource_key, .. }
            | Self::OnNoOpUpdate { resource_key } => resource_key,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OnObjectCreate { .. } => "onObjectCreate",
            Self::OnObjectDelete { .. } => "onObjectDelete",
            Self::OnObjectUpdate { .. } => "onObjectUpdate",
            Self::OnAnyFieldModification { .. } => "onAnyFieldModification",
            Self::OnNoOpUpdate { .. } => "onNoOpUpdate",
        };
        write!(f, "{}({})", name, self.resource_key())
    }
}

/// Side effect performed when a step fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,

    /// Release the notification first and let the action complete on its own
    #[serde(default, rename = "async")]
    pub is_async: bool,
}

fn default_scope() -> String {
    ALL_SCOPES.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionKind {
    #[serde(rename = "pauseAPIServer", rename_all = "camelCase")]
    PauseApiServer {
        api_server_name: String,
        #[serde(default = "default_scope")]
        pause_scope: String,
    },

    #[serde(rename = "resumeAPIServer", rename_all = "camelCase")]
    ResumeApiServer {
        api_server_name: String,
        #[serde(default = "default_scope")]
        pause_scope: String,
    },

    PauseControllerRead,

    ResumeControllerRead,

    /// Handed to the configured action executor
    External {
        name: String,
        #[serde(default)]
        args: Value,
    },
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PauseApiServer {
                api_server_name,
                pause_scope,
            } => write!(f, "pauseAPIServer({}, {})", api_server_name, pause_scope),
            Self::ResumeApiServer {
                api_server_name,
                pause_scope,
            } => write!(f, "resumeAPIServer({}, {})", api_server_name, pause_scope),
            Self::PauseControllerRead => f.write_str("pauseControllerRead"),
            Self::ResumeControllerRead => f.write_str("resumeControllerRead"),
            Self::External { name, .. } => write!(f, "external({})", name),
        }
    }
}

impl TestPlan {
    /// Load and validate a plan from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "TestPlan::load: called");
        let content = fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let plan = Self::from_yaml(&content)?;
        info!(path = %path.display(), steps = plan.len(), "Loaded test plan");
        Ok(plan)
    }

    /// Parse and validate a plan from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, PlanError> {
        let plan: Self = serde_yaml::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        for (step, s) in self.steps.iter().enumerate() {
            let invalid = |reason: &str| PlanError::Invalid {
                step: step + 1,
                reason: reason.to_string(),
            };
            if s.trigger.occurrence == 0 {
                return Err(invalid("occurrence must be at least 1"));
            }
            if s.trigger.condition.resource_key().is_empty() {
                return Err(invalid("condition needs a resourceKey"));
            }
            match &s.action.kind {
                ActionKind::PauseApiServer { api_server_name, .. }
                | ActionKind::ResumeApiServer { api_server_name, .. }
                    if api_server_name.is_empty() =>
                {
                    return Err(invalid("apiServerName must not be empty"));
                }
                ActionKind::External { name, .. } if name.is_empty() => {
                    return Err(invalid("external action needs a name"));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const PLAN: &str = r#"
steps:
  - name: stall-following
    trigger:
      when: afterControllerWrite
      by: deployment-reconciler
      condition:
        type: onObjectUpdate
        resourceKey: deployments/default/web
        curStateDiff:
          spec:
            replicas: 3
    action:
      type: pauseAPIServer
      apiServerName: following
  - trigger:
      when: beforeAPIServerRecv
      occurrence: 2
      condition:
        type: onObjectDelete
        resourceKey: pods/default/web-1
    action:
      type: external
      name: restartController
      args: {pod: web-1}
      async: true
  - trigger:
      when: afterControllerRecv
      condition:
        type: onNoOpUpdate
        resourceKey: pods/default/web-1
    action:
      type: resumeControllerRead
"#;

    #[test]
    fn test_parse_plan() {
        let plan = TestPlan::from_yaml(PLAN).unwrap();
        assert_eq!(plan.len(), 3);

        let first = &plan.steps[0];
        assert_eq!(first.label(0), "stall-following");
        assert_eq!(first.trigger.when, ObservationStage::AfterControllerWrite);
        assert_eq!(first.trigger.occurrence, 1);
        match &first.trigger.condition {
            Condition::OnObjectUpdate {
                cur_state_diff,
                prev_state_diff,
                convert_state_to_api_form,
                ..
            } => {
                assert_eq!(cur_state_diff.as_ref().unwrap(), &json!({"spec": {"replicas": 3}}));
                assert!(prev_state_diff.is_none());
                assert!(!convert_state_to_api_form);
            }
            other => panic!("unexpected condition {:?}", other),
        }
        assert_eq!(
            first.action.kind,
            ActionKind::PauseApiServer {
                api_server_name: "following".to_string(),
                pause_scope: ALL_SCOPES.to_string(),
            }
        );
        assert!(!first.action.is_async);

        let second = &plan.steps[1];
        assert_eq!(second.label(1), "step-2");
        assert_eq!(second.trigger.occurrence, 2);
        assert!(second.trigger.by.is_none());
        assert!(second.action.is_async);
        assert_eq!(second.action.kind.to_string(), "external(restartController)");

        assert_eq!(plan.steps[2].action.kind, ActionKind::ResumeControllerRead);
    }

    #[test]
    fn test_empty_plan() {
        let plan = TestPlan::from_yaml("steps: []").unwrap();
        assert!(plan.is_empty());
        assert!(TestPlan::from_yaml("{}").unwrap().is_empty());
    }

    #[test]
    fn test_zero_occurrence_rejected() {
        let yaml = r#"
steps:
  - trigger:
      when: afterAPIServerRecv
      occurrence: 0
      condition: {type: onObjectCreate, resourceKey: pods/default/a}
    action: {type: pauseControllerRead}
"#;
        let err = TestPlan::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, PlanError::Invalid { step: 1, .. }));
    }

    #[test]
    fn test_unknown_condition_is_parse_error() {
        let yaml = r#"
steps:
  - trigger:
      when: afterAPIServerRecv
      condition: {type: onSomethingElse, resourceKey: pods/default/a}
    action: {type: pauseControllerRead}
"#;
        assert!(matches!(TestPlan::from_yaml(yaml), Err(PlanError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TestPlan::load("/nonexistent/plan.yaml").unwrap_err();
        assert!(matches!(err, PlanError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plan.yaml");
        std::fs::write(&path, PLAN).unwrap();
        assert_eq!(TestPlan::load(&path).unwrap().len(), 3);
    }
}
