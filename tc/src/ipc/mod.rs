//! Unix domain socket transport for the notification hooks
//!
//! One JSON request line and one JSON response line per connection. Each
//! connection is served on its own task, so a call parked by the coordinator
//! never holds up another.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;
pub mod server;

pub use client::CoordinatorClient;
pub use listener::{cleanup_socket, create_listener_at, read_message, send_response};
pub use messages::{RpcRequest, RpcResponse};
pub use server::{dispatch, serve};

/// Maximum size of one request or response line
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Default socket path for the coordinator
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("testcoord")
        .join("coordinator.sock")
}
