//! Typed decode/encode of the schema-agnostic object payloads
//!
//! Components send objects as JSON text. Nothing here interprets resource
//! semantics beyond the `metadata.name`/`metadata.namespace` pair needed to
//! derive a resource key for listed items.

use serde_json::{Map, Value};
use thiserror::Error;

/// Decoded structured object
pub type ObjectMap = Map<String, Value>;

/// Errors from decoding an object payload
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("object list has no \"items\" array")]
    MissingItems,

    #[error("item {0} of the object list is not an object")]
    BadItem(usize),
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode one object from JSON text
pub fn decode_object(text: &str) -> Result<ObjectMap, DecodeError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::NotAnObject(value_kind(&other))),
    }
}

/// Decode a list result, which must carry an `items` array of objects
pub fn decode_object_list(text: &str) -> Result<Vec<ObjectMap>, DecodeError> {
    let mut list = decode_object(text)?;
    let items = match list.remove("items") {
        Some(Value::Array(items)) => items,
        // A list with no elements serializes `items` as null
        Some(Value::Null) => return Ok(Vec::new()),
        _ => return Err(DecodeError::MissingItems),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(DecodeError::BadItem(i)),
        })
        .collect()
}

/// Encode an object back to compact JSON text
pub fn encode_object(object: &ObjectMap) -> String {
    Value::Object(object.clone()).to_string()
}

/// Strip the type envelope so writes compare on content only
pub fn trim_kind_api_version(object: &mut ObjectMap) {
    object.remove("kind");
    object.remove("apiVersion");
}

/// Name and namespace from `metadata`; missing fields come back empty
pub fn name_namespace(object: &ObjectMap) -> (String, String) {
    let metadata = object.get("metadata").and_then(Value::as_object);
    let field = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    (field("name"), field("namespace"))
}

/// Build a resource key `type/namespace/name`
///
/// Cluster-scoped resources have no namespace and get `type/name`.
pub fn resource_key(resource_type: &str, namespace: &str, name: &str) -> String {
    [resource_type, namespace, name]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

/// Resource type of a key: its first segment
pub fn resource_type_of(resource_key: &str) -> &str {
    resource_key.split('/').next().unwrap_or_default()
}
