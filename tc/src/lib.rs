//! testcoord - synchronization core for forcing event interleavings
//!
//! Instrumented API servers and controllers report lifecycle hooks to one
//! coordinator. Every reporting call is recorded, turned into a notification,
//! and held until the scenario state machine has matched it against the test
//! plan and performed any action the plan attaches to it.
//!
//! # Modules
//!
//! - [`domain`] - observation stages, operation tags, object helpers
//! - [`store`] - last-seen object state per observer, stage, and resource
//! - [`mask`] - field masks and the masked diff
//! - [`gate`] - controller read gate and API-server pause gates
//! - [`notification`] - notifications and their release signal
//! - [`plan`] - test plan format and trigger matching
//! - [`coordinator`] - hook handlers and the scenario state machine
//! - [`ipc`] - Unix socket transport
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod gate;
pub mod ipc;
pub mod mask;
pub mod notification;
pub mod plan;
pub mod store;

pub use config::{ClusterConfig, Config, MaskConfig};
pub use coordinator::{
    ActionExecutor, CoordinatorConfig, HistoryEntry, NotificationCoordinator, ScenarioStatus, TestCoordinator,
};
pub use domain::{ObservationStage, resource_key};
pub use mask::{FieldMask, FieldMaskRegistry};
pub use plan::TestPlan;
pub use store::ObjectStateStore;
