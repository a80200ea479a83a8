//! Field masks and the masked state diff used by update triggers

mod api;
mod diff;
mod registry;

pub use api::{field_to_api_form, object_to_api_form, path_to_api_form};
pub use diff::{StateDiff, contains, masked_diff};
pub use registry::{FieldMask, FieldMaskRegistry, MaskSet, normalize_path};
