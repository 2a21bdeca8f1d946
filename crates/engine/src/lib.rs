//! `reconform-engine` — Conformer record reconciliation engine.
//!
//! Pure engine crate: receives pre-grouped partial records, returns merged
//! canonical records, fate classifications, duplicate resolutions, topology
//! summaries and tiered views. No CLI or file IO dependencies. All entry
//! points are pure with respect to their inputs (observability counters go
//! through an explicit [`metrics::Metrics`] sink), so the surrounding batch
//! runtime may re-execute any unit of work without corrupting results.

pub mod canonical;
pub mod duplicates;
pub mod error;
pub mod fate;
pub mod filter;
pub mod merge;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod stats;
pub mod summary;

pub use canonical::{update_record, CanonicalMismatch, CanonicalResult};
pub use error::EngineError;
pub use fate::classify;
pub use merge::{merge_group, ConflictRecord, MergeConflict, MergeOutcome, DEFAULT_TOLERANCE};
pub use metrics::Metrics;
pub use model::{
    Conformer, ConformerId, Fate, Origin, PartialRecord, Tier, Topology, TopologyId,
    TopologySummary,
};
