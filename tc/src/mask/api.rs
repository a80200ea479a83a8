//! Conversion between native (JSON) field naming and API-form naming
//!
//! API form is the naming of the typed client structs: every schema field is
//! capitalized and the `metadata` block is called `ObjectMeta`. Test plans that
//! describe diffs in that convention ask for states and masks in this form.
//!
//! Maps whose keys are data rather than schema fields (labels, annotations,
//! resource quantities, ...) keep their keys verbatim, so `a` and `A` stay
//! distinct entries.

use serde_json::Value;

use crate::domain::ObjectMap;

/// Map-valued fields whose keys are user data
const FREE_FORM_FIELDS: &[&str] = &[
    "labels",
    "annotations",
    "data",
    "stringData",
    "binaryData",
    "nodeSelector",
    "matchLabels",
    "capacity",
    "allocatable",
    "limits",
    "requests",
];

fn is_free_form(field: &str) -> bool {
    FREE_FORM_FIELDS.contains(&field)
}

/// API-form name of a single field
pub fn field_to_api_form(field: &str) -> String {
    if field == "metadata" {
        return "ObjectMeta".to_string();
    }
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// API-form of a normalized `/`-separated path
///
/// Segments below a free-form map are data keys and are kept as is.
pub fn path_to_api_form(path: &str) -> String {
    let mut in_data = false;
    path.split('/')
        .map(|segment| {
            if in_data {
                return segment.to_string();
            }
            in_data = is_free_form(segment);
            field_to_api_form(segment)
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Rename every schema field of an object (recursively) to API form
pub fn object_to_api_form(object: &ObjectMap) -> ObjectMap {
    object
        .iter()
        .map(|(k, v)| {
            let value = if is_free_form(k) { v.clone() } else { value_to_api_form(v) };
            (field_to_api_form(k), value)
        })
        .collect()
}

fn value_to_api_form(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(object_to_api_form(map)),
        Value::Array(items) => Value::Array(items.iter().map(value_to_api_form).collect()),
        other => other.clone(),
    }
}
