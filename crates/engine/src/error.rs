use std::fmt;

use crate::model::{ConformerId, Origin};

/// Structural validation failures. These abort processing of the affected
/// group; numeric conflicts are not errors and travel through the conflict
/// side channel instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A partial record landed in a group keyed by a different id.
    WrongGroup { expected: ConformerId, found: ConformerId },
    /// Two partial records from the same stage for one id.
    DuplicateSource { id: ConformerId, origin: Origin },
    /// A stage partial arrived malformed (topology/geometry multiplicity).
    MalformedPartial { id: ConformerId, detail: String },
    /// Stage-1 and stage-2 disagree on the structural topology.
    TopologyMismatch { id: ConformerId },
    /// A duplicate group has zero or more than one unmarked primary.
    PrimaryCount { key: ConformerId, found: usize },
    /// The group's single primary does not carry the group id.
    WrongPrimary { key: ConformerId, id: ConformerId },
    /// A group member points at a different primary than the group key.
    ForeignMember { key: ConformerId, id: ConformerId },
    /// A record reached aggregation without a fate.
    Unclassified { id: ConformerId },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongGroup { expected, found } => {
                write!(f, "group {expected}: found record with id {found}")
            }
            Self::DuplicateSource { id, origin } => {
                write!(f, "conformer {id}: more than one {origin} record")
            }
            Self::MalformedPartial { id, detail } => {
                write!(f, "conformer {id}: malformed partial record: {detail}")
            }
            Self::TopologyMismatch { id } => {
                write!(f, "conformer {id}: stage1/stage2 topology mismatch")
            }
            Self::PrimaryCount { key, found } => {
                write!(f, "duplicate group {key}: expected 1 primary, found {found}")
            }
            Self::WrongPrimary { key, id } => {
                write!(f, "duplicate group {key}: primary has id {id}")
            }
            Self::ForeignMember { key, id } => {
                write!(f, "duplicate group {key}: member {id} points elsewhere")
            }
            Self::Unclassified { id } => {
                write!(f, "conformer {id}: no fate assigned before aggregation")
            }
        }
    }
}

impl std::error::Error for EngineError {}
