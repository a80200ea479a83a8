//! Integration tests for testcoord
//!
//! These drive a coordinator over its Unix socket the way instrumented
//! components do.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use testcoord::config::ClusterConfig;
use testcoord::coordinator::{
    ApiServerRecvRequest, ControllerGetRequest, ControllerReadPauseRequest, ControllerRecvRequest,
    ControllerWriteRequest, CoordinatorConfig, HistoryEntry, LoggingExecutor, NotificationCoordinator,
    TestCoordinator,
};
use testcoord::domain::ChangeKind;
use testcoord::gate::ALL_SCOPES;
use testcoord::ipc::{self, CoordinatorClient, RpcResponse};
use testcoord::mask::{FieldMask, FieldMaskRegistry};
use testcoord::plan::TestPlan;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{broadcast, oneshot};
use tokio::time::timeout;

struct Server {
    client: CoordinatorClient,
    coordinator: Arc<NotificationCoordinator>,
    history: broadcast::Receiver<HistoryEntry>,
    socket_path: PathBuf,
    _shutdown: oneshot::Sender<()>,
    _temp: TempDir,
}

fn start_server(plan: &str, masks: FieldMaskRegistry) -> Server {
    start_server_with(plan, masks, CoordinatorConfig::default())
}

fn start_server_with(plan: &str, masks: FieldMaskRegistry, config: CoordinatorConfig) -> Server {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let socket_path = temp.path().join("coordinator.sock");

    let plan = TestPlan::from_yaml(plan).expect("Invalid plan");
    let coordinator = TestCoordinator::new(
        config,
        ClusterConfig::default(),
        plan,
        masks,
        Arc::new(LoggingExecutor),
    );
    let history = coordinator.subscribe_history();
    let (handle, _machine) = coordinator.start();

    let (listener, _) = ipc::create_listener_at(&socket_path).expect("Failed to bind socket");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(ipc::serve(listener, handle.clone(), async {
        let _ = shutdown_rx.await;
    }));

    Server {
        client: CoordinatorClient::with_socket_path(socket_path.clone()),
        coordinator: handle,
        history,
        socket_path,
        _shutdown: shutdown_tx,
        _temp: temp,
    }
}

fn api_req(host: &str, op: &str, key: &str, object: &str) -> ApiServerRecvRequest {
    ApiServerRecvRequest {
        host: host.to_string(),
        operation_type: op.to_string(),
        resource_key: key.to_string(),
        object: object.to_string(),
    }
}

const FOO: &str = r#"{"metadata":{"name":"foo","namespace":"default"}}"#;

// =============================================================================
// Wire protocol
// =============================================================================

#[tokio::test]
async fn test_ping_and_status() {
    let server = start_server("steps: []", FieldMaskRegistry::default());

    let version = server.client.ping().await.unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));

    let status = server.client.status().await.unwrap();
    assert_eq!(status.total_steps, 0);
    assert_eq!(status.notifications_processed, 0);
}

#[tokio::test]
async fn test_malformed_request_gets_error_response() {
    let server = start_server("steps: []", FieldMaskRegistry::default());

    let mut stream = UnixStream::connect(&server.socket_path).await.unwrap();
    stream.write_all(b"{\"type\":\"NoSuchCall\"}\n").await.unwrap();

    let mut reader = BufReader::new(&mut stream);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let response: RpcResponse = serde_json::from_str(line.trim()).unwrap();
    assert!(matches!(response, RpcResponse::Error { .. }));
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_added_on_api_server_without_plan() {
    let mut server = start_server("steps: []", FieldMaskRegistry::default());

    let resp = server
        .client
        .notify_before_api_server_recv(api_req("host-A", "Added", "pods/default/foo", FOO))
        .await
        .unwrap();
    assert!(resp.ok);

    let entry = server.history.try_recv().unwrap();
    assert_eq!(entry.header.resource_key, "pods/default/foo");
    assert_eq!(entry.change, ChangeKind::Create);
    assert!(entry.fired_step.is_none());

    let stored = server
        .coordinator
        .store()
        .read(
            "host-A",
            testcoord::ObservationStage::BeforeApiServerRecv,
            "pods/default/foo",
        )
        .unwrap();
    assert_eq!(stored, FOO);
}

#[tokio::test]
async fn test_plan_pauses_and_resumes_following_api_server() {
    let plan = r#"
steps:
  - name: stall-following
    trigger:
      when: afterControllerWrite
      by: R
      condition: {type: onNoOpUpdate, resourceKey: pods/default/foo}
    action:
      type: pauseAPIServer
      apiServerName: following
      pauseScope: pods/default/foo
  - name: release-following
    trigger:
      when: afterControllerRecv
      condition: {type: onObjectCreate, resourceKey: pods/default/bar}
    action:
      type: resumeAPIServer
      apiServerName: following
      pauseScope: pods/default/foo
"#;
    let masks = FieldMaskRegistry::new(FieldMask::new(["resourceVersion"], Vec::<&str>::new()));
    let server = start_server(plan, masks);
    let client = &server.client;

    client
        .notify_after_controller_get(ControllerGetRequest {
            reconciler_type: "R".to_string(),
            resource_key: "pods/default/foo".to_string(),
            object: r#"{"spec":{"x":1},"resourceVersion":"10"}"#.to_string(),
        })
        .await
        .unwrap();
    client
        .notify_after_controller_write(ControllerWriteRequest {
            reconciler_type: "R".to_string(),
            write_type: "Update".to_string(),
            resource_key: "pods/default/foo".to_string(),
            object: r#"{"spec":{"x":1},"resourceVersion":"11"}"#.to_string(),
        })
        .await
        .unwrap();
    assert!(
        server
            .coordinator
            .pause_gates()
            .is_locked("kind-control-plane3", "pods/default/foo")
    );

    // A call on the following API server for that resource parks after release
    let parked = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .notify_after_api_server_recv(api_req("kind-control-plane3", "Added", "pods/default/foo", FOO))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!parked.is_finished());

    // Other hosts are not affected
    let resp = timeout(
        Duration::from_secs(2),
        client.notify_after_api_server_recv(api_req("kind-control-plane", "Added", "pods/default/foo", FOO)),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(resp.ok);

    client
        .notify_after_controller_recv(ControllerRecvRequest {
            operation_type: "Added".to_string(),
            resource_key: "pods/default/bar".to_string(),
            object: "{}".to_string(),
        })
        .await
        .unwrap();

    let resp = timeout(Duration::from_secs(2), parked).await.unwrap().unwrap().unwrap();
    assert!(resp.ok);

    let status = client.status().await.unwrap();
    assert!(status.is_complete());
    assert_eq!(status.consumed_steps, 2);
}

#[tokio::test]
async fn test_exact_scope_gate_takes_precedence_over_wildcard() {
    let server = start_server("steps: []", FieldMaskRegistry::default());
    let gates = server.coordinator.pause_gates();
    gates.pause("host-A", ALL_SCOPES);
    gates.pause("host-A", "pods/default/foo");

    let parked = {
        let client = server.client.clone();
        tokio::spawn(async move {
            client
                .notify_before_api_server_recv(api_req("host-A", "Deleted", "pods/default/foo", FOO))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!parked.is_finished());

    // Unlocking only the exact scope frees the call even though the wildcard stays locked
    gates.resume("host-A", "pods/default/foo");
    let resp = timeout(Duration::from_secs(2), parked).await.unwrap().unwrap().unwrap();
    assert!(resp.ok);
    assert!(gates.is_locked("host-A", ALL_SCOPES));
}

#[tokio::test]
async fn test_concurrent_callers_are_serialized_and_all_released() {
    let mut server = start_server("steps: []", FieldMaskRegistry::default());

    let mut calls = Vec::new();
    for i in 0..20 {
        let client = server.client.clone();
        calls.push(tokio::spawn(async move {
            let key = format!("pods/default/p{}", i);
            client
                .notify_before_api_server_recv(api_req("host-A", "Added", &key, "{}"))
                .await
        }));
    }
    for call in calls {
        let resp = timeout(Duration::from_secs(5), call).await.unwrap().unwrap().unwrap();
        assert!(resp.ok);
    }

    // Sequence numbers are assigned at enqueue; evaluation order must match them
    let seqs: Vec<u64> = (0..20).map(|_| server.history.try_recv().unwrap().header.seq).collect();
    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    assert_eq!(seqs, sorted);
    assert!(server.history.try_recv().is_err());
}

#[tokio::test]
async fn test_status_reports_timed_out_releases() {
    // The async pauseControllerRead waits on the controller's read, so the
    // queue stalls after it fires and the next call times out
    let plan = r#"
steps:
  - trigger:
      when: beforeAPIServerRecv
      condition: {type: onObjectCreate, resourceKey: pods/default/a}
    action: {type: pauseControllerRead, async: true}
"#;
    let config = CoordinatorConfig {
        release_timeout_ms: Some(100),
        ..Default::default()
    };
    let server = start_server_with(plan, FieldMaskRegistry::default(), config);
    let client = &server.client;

    client
        .notify_before_controller_read_pause(ControllerReadPauseRequest::default())
        .await
        .unwrap();
    client
        .notify_before_api_server_recv(api_req("host-A", "Added", "pods/default/a", FOO))
        .await
        .unwrap();
    assert_eq!(client.status().await.unwrap().timed_out_releases, 0);

    let resp = timeout(
        Duration::from_secs(2),
        client.notify_before_api_server_recv(api_req("host-A", "Added", "pods/default/b", FOO)),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(resp.ok);
    assert_eq!(client.status().await.unwrap().timed_out_releases, 1);

    client
        .notify_after_controller_read_pause(ControllerReadPauseRequest::default())
        .await
        .unwrap();
}
