//! Trigger evaluation against notifications

use serde_json::Value;

use super::{Condition, Trigger};
use crate::domain::ObjectMap;
use crate::mask::{StateDiff, contains, masked_diff, object_to_api_form};
use crate::notification::{Notification, NotificationKind, UpdatePayload};

impl Trigger {
    /// Whether one notification satisfies this trigger
    ///
    /// Occurrence counting is left to the caller.
    pub fn matches(&self, notification: &Notification) -> bool {
        let header = &notification.header;
        if header.observation_stage != self.when {
            return false;
        }
        if self.by.as_ref().is_some_and(|by| *by != header.observer) {
            return false;
        }
        if header.resource_key != self.condition.resource_key() {
            return false;
        }
        self.condition.matches(&notification.kind)
    }
}

impl Condition {
    fn matches(&self, kind: &NotificationKind) -> bool {
        match (self, kind) {
            (Self::OnObjectCreate { .. }, NotificationKind::Create) => true,
            (Self::OnObjectDelete { .. }, NotificationKind::Delete) => true,
            (
                Self::OnObjectUpdate {
                    prev_state_diff,
                    cur_state_diff,
                    convert_state_to_api_form,
                    ..
                },
                NotificationKind::Update(payload),
            ) => {
                let diff = payload_diff(payload, *convert_state_to_api_form);
                side_matches(&diff.prev, prev_state_diff.as_ref()) && side_matches(&diff.cur, cur_state_diff.as_ref())
            }
            (
                Self::OnAnyFieldModification {
                    convert_state_to_api_form,
                    ..
                },
                NotificationKind::Update(payload),
            ) => !payload_diff(payload, *convert_state_to_api_form).is_empty(),
            (Self::OnNoOpUpdate { .. }, NotificationKind::Update(payload)) => payload_diff(payload, false).is_empty(),
            _ => false,
        }
    }
}

/// Masked diff of an update, in native or API form
pub fn payload_diff(payload: &UpdatePayload, api_form: bool) -> StateDiff {
    if api_form {
        masked_diff(
            &object_to_api_form(&payload.prev_state),
            &object_to_api_form(&payload.cur_state),
            &payload.masks.api,
        )
    } else {
        masked_diff(&payload.prev_state, &payload.cur_state, &payload.masks.native)
    }
}

fn side_matches(side: &ObjectMap, pattern: Option<&Value>) -> bool {
    match pattern {
        None => true,
        Some(pattern) => contains(&Value::Object(side.clone()), pattern),
    }
}
