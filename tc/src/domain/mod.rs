//! Domain types shared by the coordinator, the plan, and the wire protocol

mod object;
mod stage;

pub use object::{
    DecodeError, ObjectMap, decode_object, decode_object_list, encode_object, name_namespace, resource_key,
    resource_type_of, trim_kind_api_version,
};
pub use stage::{ApiOperation, ChangeKind, INFORMER, InformerOperation, ObservationStage, UnsupportedTag, WriteType};
