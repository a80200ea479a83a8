//! Observation points and the operation tags instrumented components report

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Observer identity used by both informer hooks
pub const INFORMER: &str = "informer";

/// Where in the pipeline a snapshot was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObservationStage {
    #[serde(rename = "beforeAPIServerRecv")]
    BeforeApiServerRecv,
    #[serde(rename = "afterAPIServerRecv")]
    AfterApiServerRecv,
    #[serde(rename = "beforeControllerRecv")]
    BeforeControllerRecv,
    #[serde(rename = "afterControllerRecv")]
    AfterControllerRecv,
    #[serde(rename = "afterControllerWrite")]
    AfterControllerWrite,
}

impl ObservationStage {
    pub const ALL: [ObservationStage; 5] = [
        Self::BeforeApiServerRecv,
        Self::AfterApiServerRecv,
        Self::BeforeControllerRecv,
        Self::AfterControllerRecv,
        Self::AfterControllerWrite,
    ];

    /// Name used on the wire and in test plans
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeApiServerRecv => "beforeAPIServerRecv",
            Self::AfterApiServerRecv => "afterAPIServerRecv",
            Self::BeforeControllerRecv => "beforeControllerRecv",
            Self::AfterControllerRecv => "afterControllerRecv",
            Self::AfterControllerWrite => "afterControllerWrite",
        }
    }
}

impl fmt::Display for ObservationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation tag the coordinator does not know how to classify
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported {kind} tag: {tag:?}")]
pub struct UnsupportedTag {
    pub kind: &'static str,
    pub tag: String,
}

impl UnsupportedTag {
    fn new(kind: &'static str, tag: &str) -> Self {
        Self {
            kind,
            tag: tag.to_string(),
        }
    }
}

/// Coarse change every operation tag maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Watch event type seen by an API server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    Added,
    Modified,
    Deleted,
}

impl FromStr for ApiOperation {
    type Err = UnsupportedTag;

    // API servers report watch event types in upper case, so match either spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "added" => Ok(Self::Added),
            "modified" => Ok(Self::Modified),
            "deleted" => Ok(Self::Deleted),
            _ => Err(UnsupportedTag::new("API server operation", s)),
        }
    }
}

impl From<ApiOperation> for ChangeKind {
    fn from(op: ApiOperation) -> Self {
        match op {
            ApiOperation::Added => Self::Create,
            ApiOperation::Modified => Self::Update,
            ApiOperation::Deleted => Self::Delete,
        }
    }
}

/// Informer delta type delivered to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformerOperation {
    Added,
    Updated,
    Replaced,
    Sync,
    Deleted,
}

impl FromStr for InformerOperation {
    type Err = UnsupportedTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Added" => Ok(Self::Added),
            "Updated" => Ok(Self::Updated),
            "Replaced" => Ok(Self::Replaced),
            "Sync" => Ok(Self::Sync),
            "Deleted" => Ok(Self::Deleted),
            _ => Err(UnsupportedTag::new("informer operation", s)),
        }
    }
}

impl From<InformerOperation> for ChangeKind {
    fn from(op: InformerOperation) -> Self {
        match op {
            InformerOperation::Added => Self::Create,
            InformerOperation::Updated | InformerOperation::Replaced | InformerOperation::Sync => Self::Update,
            InformerOperation::Deleted => Self::Delete,
        }
    }
}

/// Write issued by a reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    Create,
    Update,
    Patch,
    StatusUpdate,
    StatusPatch,
    Delete,
}

impl FromStr for WriteType {
    type Err = UnsupportedTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(Self::Create),
            "Update" => Ok(Self::Update),
            "Patch" => Ok(Self::Patch),
            "StatusUpdate" => Ok(Self::StatusUpdate),
            "StatusPatch" => Ok(Self::StatusPatch),
            "Delete" => Ok(Self::Delete),
            _ => Err(UnsupportedTag::new("write", s)),
        }
    }
}

impl From<WriteType> for ChangeKind {
    fn from(op: WriteType) -> Self {
        match op {
            WriteType::Create => Self::Create,
            WriteType::Update | WriteType::Patch | WriteType::StatusUpdate | WriteType::StatusPatch => Self::Update,
            WriteType::Delete => Self::Delete,
        }
    }
}
