//! Request and response types of the notification hooks
//!
//! Operation tags stay plain strings here so an unknown tag reaches the
//! handler, which logs it and lets the call through.

use serde::{Deserialize, Serialize};

/// Before/after API-server recv
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerRecvRequest {
    pub host: String,
    /// Added, Modified, or Deleted
    pub operation_type: String,
    pub resource_key: String,
    pub object: String,
}

/// Before/after controller recv (informer delivery)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRecvRequest {
    /// Added, Updated, Replaced, Sync, or Deleted
    pub operation_type: String,
    pub resource_key: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerGetRequest {
    pub reconciler_type: String,
    pub resource_key: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerListRequest {
    pub reconciler_type: String,
    pub resource_type: String,
    /// Encoded list object with an `items` array
    pub object_list: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerWriteRequest {
    pub reconciler_type: String,
    /// Create, Update, Patch, StatusUpdate, StatusPatch, or Delete
    pub write_type: String,
    pub resource_key: String,
    pub object: String,
}

/// Before/after controller read pause
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerReadPauseRequest {
    #[serde(default)]
    pub resource_key: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub use_resource_key: bool,
}

/// Reply to every notify call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
}

impl NotifyResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let req = ControllerWriteRequest {
            reconciler_type: "R".to_string(),
            write_type: "Update".to_string(),
            resource_key: "pods/default/foo".to_string(),
            object: "{}".to_string(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["reconcilerType"], "R");
        assert_eq!(json["writeType"], "Update");
        assert_eq!(json["resourceKey"], "pods/default/foo");
    }

    #[test]
    fn test_read_pause_fields_default() {
        let req: ControllerReadPauseRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.use_resource_key);
        assert!(req.resource_key.is_empty());
    }

    #[test]
    fn test_ok_response() {
        let json = serde_json::to_string(&NotifyResponse::ok()).unwrap();
        assert_eq!(json, r#"{"ok":true,"message":""}"#);
    }
}
