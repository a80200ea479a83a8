//! Accept loop and request dispatch

use std::future::Future;
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use super::listener::{read_message, send_response};
use super::messages::{RpcRequest, RpcResponse};
use crate::coordinator::NotificationCoordinator;

/// Route one request to its handler
pub async fn dispatch(coordinator: &NotificationCoordinator, request: RpcRequest) -> RpcResponse {
    match request {
        RpcRequest::NotifyBeforeApiServerRecv(req) => {
            RpcResponse::Ack(coordinator.notify_before_api_server_recv(req).await)
        }
        RpcRequest::NotifyAfterApiServerRecv(req) => RpcResponse::Ack(coordinator.notify_after_api_server_recv(req).await),
        RpcRequest::NotifyBeforeControllerRecv(req) => {
            RpcResponse::Ack(coordinator.notify_before_controller_recv(req).await)
        }
        RpcRequest::NotifyAfterControllerRecv(req) => {
            RpcResponse::Ack(coordinator.notify_after_controller_recv(req).await)
        }
        RpcRequest::NotifyAfterControllerGet(req) => RpcResponse::Ack(coordinator.notify_after_controller_get(req).await),
        RpcRequest::NotifyAfterControllerList(req) => {
            RpcResponse::Ack(coordinator.notify_after_controller_list(req).await)
        }
        RpcRequest::NotifyAfterControllerWrite(req) => {
            RpcResponse::Ack(coordinator.notify_after_controller_write(req).await)
        }
        RpcRequest::NotifyBeforeControllerReadPause(req) => {
            RpcResponse::Ack(coordinator.notify_before_controller_read_pause(req).await)
        }
        RpcRequest::NotifyAfterControllerReadPause(req) => {
            RpcResponse::Ack(coordinator.notify_after_controller_read_pause(req).await)
        }
        RpcRequest::Ping => RpcResponse::Pong {
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        RpcRequest::Status => RpcResponse::Status {
            status: coordinator.status(),
        },
    }
}

/// Serve connections until `shutdown` resolves
///
/// Connections already accepted keep running on their own tasks.
pub async fn serve<F>(listener: UnixListener, coordinator: Arc<NotificationCoordinator>, shutdown: F)
where
    F: Future<Output = ()>,
{
    info!("Coordinator listening for hook calls");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        debug!("serve: connection accepted");
                        let coordinator = coordinator.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &coordinator).await {
                                warn!(error = %e, "serve: connection error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "serve: accept error");
                    }
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, coordinator: &NotificationCoordinator) -> eyre::Result<()> {
    let response = match read_message(&mut stream).await {
        Ok(request) => {
            let call = request.name();
            let response = dispatch(coordinator, request).await;
            debug!(call, "handle_connection: handled");
            response
        }
        Err(e) => {
            warn!(error = %e, "handle_connection: bad request");
            RpcResponse::Error {
                message: format!("{:#}", e),
            }
        }
    };
    send_response(&mut stream, &response).await
}
