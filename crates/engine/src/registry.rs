//! Property Field Registry
//!
//! Single source of truth for every known scalar property: which stage
//! produces it and which visibility tier it belongs to. The merge engine,
//! the fate classifier and the availability filter all consult this table
//! instead of hard-coding field lists.

use crate::model::{Properties, Tier};

/// Which computation stage produces a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    One,
    Two,
}

/// Declared metadata of one scalar property field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub stage: Stage,
    pub tier: Tier,
}

/// All known scalar property fields.
pub const FIELDS: &[FieldSpec] = &[
    // Stage-1 geometry bookkeeping. Internal only: these exist to cross-check
    // the two stages, not for downstream consumption.
    FieldSpec {
        name: "initial_geometry_energy",
        stage: Stage::One,
        tier: Tier::InternalOnly,
    },
    FieldSpec {
        name: "initial_geometry_gradient_norm",
        stage: Stage::One,
        tier: Tier::InternalOnly,
    },
    FieldSpec {
        name: "optimized_geometry_energy",
        stage: Stage::One,
        tier: Tier::InternalOnly,
    },
    FieldSpec {
        name: "optimized_geometry_gradient_norm",
        stage: Stage::One,
        tier: Tier::InternalOnly,
    },
    // Stage-2 refinement results.
    FieldSpec {
        name: "single_point_energy",
        stage: Stage::Two,
        tier: Tier::Standard,
    },
    FieldSpec {
        name: "zero_point_correction",
        stage: Stage::Two,
        tier: Tier::Standard,
    },
    FieldSpec {
        name: "dipole_moment",
        stage: Stage::Two,
        tier: Tier::Standard,
    },
    FieldSpec {
        name: "homo_energy",
        stage: Stage::Two,
        tier: Tier::Complete,
    },
    FieldSpec {
        name: "lumo_energy",
        stage: Stage::Two,
        tier: Tier::Complete,
    },
    FieldSpec {
        name: "lowest_harmonic_frequency",
        stage: Stage::Two,
        tier: Tier::Complete,
    },
    FieldSpec {
        name: "nuclear_repulsion_energy",
        stage: Stage::Two,
        tier: Tier::InternalOnly,
    },
];

/// The four stage-1 float fields snapshotted into conflict rows, in row order.
pub const CONFLICT_FLOAT_FIELDS: [&str; 4] = [
    "initial_geometry_energy",
    "initial_geometry_gradient_norm",
    "optimized_geometry_energy",
    "optimized_geometry_gradient_norm",
];

pub fn spec_of(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Visibility tier of a field. Unregistered names are treated as internal
/// only: never leak an unknown field into a public view.
pub fn tier_of(name: &str) -> Tier {
    spec_of(name).map(|f| f.tier).unwrap_or(Tier::InternalOnly)
}

/// Producing stage of a field. Unregistered names count as stage 2: a field
/// this table does not know about can only have come from the refinement
/// stage.
pub fn stage_of(name: &str) -> Stage {
    spec_of(name).map(|f| f.stage).unwrap_or(Stage::Two)
}

/// True when the record carries any stage-2 result at all.
pub fn has_stage2_results(properties: &Properties) -> bool {
    properties.keys().any(|name| stage_of(name) == Stage::Two)
}
