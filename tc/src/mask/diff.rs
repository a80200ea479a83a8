//! Masked before/after diff of two object states

use std::collections::BTreeSet;

use serde_json::Value;

use super::registry::FieldMask;
use crate::domain::ObjectMap;

/// Fields that differ between two states, split by side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDiff {
    pub prev: ObjectMap,
    pub cur: ObjectMap,
}

impl StateDiff {
    /// True when the states agree on every unmasked field
    pub fn is_empty(&self) -> bool {
        self.prev.is_empty() && self.cur.is_empty()
    }
}

/// Diff `prev` against `cur`, ignoring every field the mask excludes
///
/// Nested objects are compared field by field; any other value (arrays
/// included) is compared whole and reported whole when it differs.
pub fn masked_diff(prev: &ObjectMap, cur: &ObjectMap, mask: &FieldMask) -> StateDiff {
    let mut diff = StateDiff::default();
    diff_objects(prev, cur, mask, "", &mut diff.prev, &mut diff.cur);
    diff
}

fn diff_objects(
    prev: &ObjectMap,
    cur: &ObjectMap,
    mask: &FieldMask,
    prefix: &str,
    prev_out: &mut ObjectMap,
    cur_out: &mut ObjectMap,
) {
    let fields: BTreeSet<&String> = prev.keys().chain(cur.keys()).collect();

    for field in fields {
        let path = if prefix.is_empty() {
            field.clone()
        } else {
            format!("{}/{}", prefix, field)
        };
        if mask.excludes(&path, field) {
            continue;
        }

        match (prev.get(field), cur.get(field)) {
            (Some(Value::Object(p)), Some(Value::Object(c))) => {
                let mut prev_sub = ObjectMap::new();
                let mut cur_sub = ObjectMap::new();
                diff_objects(p, c, mask, &path, &mut prev_sub, &mut cur_sub);
                if !prev_sub.is_empty() {
                    prev_out.insert(field.clone(), Value::Object(prev_sub));
                }
                if !cur_sub.is_empty() {
                    cur_out.insert(field.clone(), Value::Object(cur_sub));
                }
            }
            (Some(p), Some(c)) => {
                if p != c {
                    prev_out.insert(field.clone(), p.clone());
                    cur_out.insert(field.clone(), c.clone());
                }
            }
            (Some(p), None) => {
                prev_out.insert(field.clone(), p.clone());
            }
            (None, Some(c)) => {
                cur_out.insert(field.clone(), c.clone());
            }
            (None, None) => {}
        }
    }
}

/// Whether `actual` contains everything `pattern` describes
///
/// Objects match when every pattern field is present and matches in turn;
/// every other value must be equal.
pub fn contains(actual: &Value, pattern: &Value) -> bool {
    match (actual, pattern) {
        (Value::Object(a), Value::Object(p)) => p
            .iter()
            .all(|(field, expected)| a.get(field).is_some_and(|v| contains(v, expected))),
        _ => actual == pattern,
    }
}
