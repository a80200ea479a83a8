//! Test coordinator
//!
//! [`NotificationCoordinator`] receives every instrumented hook, records
//! snapshots, and blocks each reporting call on a notification. A single
//! [`ScenarioStateMachine`] consumes those notifications in order and decides
//! when each call may proceed.

mod action;
mod config;
mod core;
mod handlers;
mod history;
mod machine;
mod messages;

pub use action::{ActionContext, ActionError, ActionExecutor, LoggingExecutor};
pub use config::CoordinatorConfig;
pub use self::core::TestCoordinator;
pub use handlers::NotificationCoordinator;
pub use history::{HistoryEntry, HistoryLogger, read_history};
pub use machine::{ScenarioStateMachine, ScenarioStatus};
pub use messages::{
    ApiServerRecvRequest, ControllerGetRequest, ControllerListRequest, ControllerReadPauseRequest,
    ControllerRecvRequest, ControllerWriteRequest, NotifyResponse,
};
