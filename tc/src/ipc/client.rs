//! Client for a running coordinator
//!
//! Used by the CLI and by tests standing in for instrumented components.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::messages::{RpcRequest, RpcResponse};
use super::{MAX_MESSAGE_SIZE, get_socket_path};
use crate::coordinator::{
    ApiServerRecvRequest, ControllerGetRequest, ControllerListRequest, ControllerReadPauseRequest,
    ControllerRecvRequest, ControllerWriteRequest, NotifyResponse, ScenarioStatus,
};

/// Default timeout for connecting
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    socket_path: PathBuf,
    connect_timeout: Duration,
}

impl Default for CoordinatorClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorClient {
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Check the coordinator is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        match self.call(RpcRequest::Ping).await? {
            RpcResponse::Pong { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<ScenarioStatus> {
        match self.call(RpcRequest::Status).await? {
            RpcResponse::Status { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn notify_before_api_server_recv(&self, req: ApiServerRecvRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyBeforeApiServerRecv(req)).await
    }

    pub async fn notify_after_api_server_recv(&self, req: ApiServerRecvRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyAfterApiServerRecv(req)).await
    }

    pub async fn notify_before_controller_recv(&self, req: ControllerRecvRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyBeforeControllerRecv(req)).await
    }

    pub async fn notify_after_controller_recv(&self, req: ControllerRecvRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyAfterControllerRecv(req)).await
    }

    pub async fn notify_after_controller_get(&self, req: ControllerGetRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyAfterControllerGet(req)).await
    }

    pub async fn notify_after_controller_list(&self, req: ControllerListRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyAfterControllerList(req)).await
    }

    pub async fn notify_after_controller_write(&self, req: ControllerWriteRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyAfterControllerWrite(req)).await
    }

    pub async fn notify_before_controller_read_pause(&self, req: ControllerReadPauseRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyBeforeControllerReadPause(req)).await
    }

    pub async fn notify_after_controller_read_pause(&self, req: ControllerReadPauseRequest) -> Result<NotifyResponse> {
        self.notify(RpcRequest::NotifyAfterControllerReadPause(req)).await
    }

    async fn notify(&self, request: RpcRequest) -> Result<NotifyResponse> {
        match self.call(request).await? {
            RpcResponse::Ack(resp) => Ok(resp),
            other => Err(unexpected(other)),
        }
    }

    /// Send one request and wait for its response
    ///
    /// Only the connect is bounded; the coordinator may hold a notify call
    /// for as long as the scenario needs.
    pub async fn call(&self, request: RpcRequest) -> Result<RpcResponse> {
        debug!(socket_path = ?self.socket_path, call = request.name(), "CoordinatorClient::call: sending");

        let mut stream = tokio::time::timeout(self.connect_timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to coordinator socket")?;

        let request_json = serde_json::to_string(&request).context("Failed to serialize request")?;
        if request_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", request_json.len()));
        }

        stream
            .write_all(request_json.as_bytes())
            .await
            .context("Failed to write request")?;
        stream.write_all(b"\n").await.context("Failed to write newline")?;
        stream.flush().await.context("Failed to flush stream")?;

        let mut reader = BufReader::new(&mut stream);
        let mut response_line = String::new();
        let bytes_read = reader
            .read_line(&mut response_line)
            .await
            .context("Failed to read response")?;
        if bytes_read > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Response too large: {} bytes", bytes_read));
        }

        let response: RpcResponse =
            serde_json::from_str(response_line.trim()).context("Failed to parse coordinator response")?;
        debug!(?response, "CoordinatorClient::call: received response");
        Ok(response)
    }
}

fn unexpected(response: RpcResponse) -> eyre::Report {
    match response {
        RpcResponse::Error { message } => eyre::eyre!("Coordinator error: {}", message),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_client_default() {
        let client = CoordinatorClient::default();
        assert!(client.socket_path.ends_with("coordinator.sock"));
    }

    #[test]
    fn test_client_with_connect_timeout() {
        let client = CoordinatorClient::new().with_connect_timeout(Duration::from_secs(10));
        assert_eq!(client.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_ping_without_coordinator_fails() {
        let temp = TempDir::new().unwrap();
        let client = CoordinatorClient::with_socket_path(temp.path().join("missing.sock"));
        assert!(!client.socket_exists());
        assert!(client.ping().await.is_err());
    }
}
