//! Wire messages
//!
//! Requests are tagged by `"type"` with the call name; fields are camelCase.

use serde::{Deserialize, Serialize};

use crate::coordinator::{
    ApiServerRecvRequest, ControllerGetRequest, ControllerListRequest, ControllerReadPauseRequest,
    ControllerRecvRequest, ControllerWriteRequest, NotifyResponse, ScenarioStatus,
};

/// Calls from instrumented components and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RpcRequest {
    #[serde(rename = "NotifyBeforeAPIServerRecv")]
    NotifyBeforeApiServerRecv(ApiServerRecvRequest),

    #[serde(rename = "NotifyAfterAPIServerRecv")]
    NotifyAfterApiServerRecv(ApiServerRecvRequest),

    NotifyBeforeControllerRecv(ControllerRecvRequest),

    NotifyAfterControllerRecv(ControllerRecvRequest),

    NotifyAfterControllerGet(ControllerGetRequest),

    NotifyAfterControllerList(ControllerListRequest),

    NotifyAfterControllerWrite(ControllerWriteRequest),

    NotifyBeforeControllerReadPause(ControllerReadPauseRequest),

    NotifyAfterControllerReadPause(ControllerReadPauseRequest),

    /// Check the coordinator is alive
    Ping,

    /// Current scenario status
    Status,
}

impl RpcRequest {
    /// Call name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotifyBeforeApiServerRecv(_) => "NotifyBeforeAPIServerRecv",
            Self::NotifyAfterApiServerRecv(_) => "NotifyAfterAPIServerRecv",
            Self::NotifyBeforeControllerRecv(_) => "NotifyBeforeControllerRecv",
            Self::NotifyAfterControllerRecv(_) => "NotifyAfterControllerRecv",
            Self::NotifyAfterControllerGet(_) => "NotifyAfterControllerGet",
            Self::NotifyAfterControllerList(_) => "NotifyAfterControllerList",
            Self::NotifyAfterControllerWrite(_) => "NotifyAfterControllerWrite",
            Self::NotifyBeforeControllerReadPause(_) => "NotifyBeforeControllerReadPause",
            Self::NotifyAfterControllerReadPause(_) => "NotifyAfterControllerReadPause",
            Self::Ping => "Ping",
            Self::Status => "Status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RpcResponse {
    /// Reply to every notify call
    Ack(NotifyResponse),

    Pong { version: String },

    Status { status: ScenarioStatus },

    /// Only for requests that could not be read or parsed
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_request_wire_format() {
        let json = r#"{"type":"NotifyBeforeAPIServerRecv","host":"host-A","operationType":"Added","resourceKey":"pods/default/foo","object":"{}"}"#;
        let req: RpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            RpcRequest::NotifyBeforeApiServerRecv(ApiServerRecvRequest {
                host: "host-A".to_string(),
                operation_type: "Added".to_string(),
                resource_key: "pods/default/foo".to_string(),
                object: "{}".to_string(),
            })
        );
        assert_eq!(req.name(), "NotifyBeforeAPIServerRecv");
        assert_eq!(serde_json::to_string(&req).unwrap(), json);
    }

    #[test]
    fn test_ping_serialize() {
        assert_eq!(serde_json::to_string(&RpcRequest::Ping).unwrap(), r#"{"type":"Ping"}"#);
    }

    #[test]
    fn test_ack_serialize() {
        let resp = RpcResponse::Ack(NotifyResponse::ok());
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"type":"Ack","ok":true,"message":""}"#
        );
    }

    #[test]
    fn test_unknown_call_is_rejected() {
        assert!(serde_json::from_str::<RpcRequest>(r#"{"type":"NotifySomethingElse"}"#).is_err());
    }
}
