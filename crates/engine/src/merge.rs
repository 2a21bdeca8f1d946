//! Merge engine.
//!
//! Folds all partial records sharing one conformer id into a single canonical
//! record. Duplicate-marker fields merge by pure set union; stage-1/stage-2
//! overlap merges under a numeric tolerance with stage-2 precedence. The
//! result is a function of the *set* of partials, never of their arrival
//! order: the surrounding dataflow may re-partition and re-execute groups
//! freely.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::model::{Conformer, ConformerId, Origin, PartialRecord};
use crate::registry::CONFLICT_FLOAT_FIELDS;

/// Absolute tolerance for numeric agreement between the stages.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Stage-2 value marking an intentionally invalid/unset measurement. Bypasses
/// the tolerance check entirely; stricter error checking happens downstream.
pub const UNSET_SENTINEL: f64 = -1.0;

// ---------------------------------------------------------------------------
// Conflict side channel
// ---------------------------------------------------------------------------

/// One side of a conflict row: the fixed snapshot of the fields both stages
/// report, taken before precedence is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictSide {
    pub opt_status: i32,
    pub coord_check: i32,
    pub connectivity_check: i32,
    pub frequency_check: i32,
    pub initial_geometry_energy: f64,
    pub initial_geometry_gradient_norm: f64,
    pub optimized_geometry_energy: f64,
    pub optimized_geometry_gradient_norm: f64,
    pub has_initial_geometry: bool,
    pub has_optimized_geometry: bool,
}

impl ConflictSide {
    pub fn snapshot(record: &Conformer) -> Self {
        let float = |name: &str| record.properties.get(name).copied().unwrap_or(0.0);
        Self {
            opt_status: record.errors.opt_status,
            coord_check: record.errors.coord_check,
            connectivity_check: record.errors.connectivity_check,
            frequency_check: record.errors.frequency_check,
            initial_geometry_energy: float(CONFLICT_FLOAT_FIELDS[0]),
            initial_geometry_gradient_norm: float(CONFLICT_FLOAT_FIELDS[1]),
            optimized_geometry_energy: float(CONFLICT_FLOAT_FIELDS[2]),
            optimized_geometry_gradient_norm: float(CONFLICT_FLOAT_FIELDS[3]),
            has_initial_geometry: record.has_initial_geometry(),
            has_optimized_geometry: record.has_optimized_geometry(),
        }
    }
}

/// Full conflict row: both sides of a stage-1/stage-2 disagreement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRecord {
    pub id: ConformerId,
    pub stage1: ConflictSide,
    pub stage2: ConflictSide,
}

/// Non-fatal merge conflicts routed to the audit channel.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeConflict {
    /// Stage-1 and stage-2 disagreed beyond tolerance; stage-2 won.
    Fields(ConflictRecord),
    /// Two duplicate markers named different primaries; the smallest id won.
    DuplicatedBy {
        id: ConformerId,
        kept: ConformerId,
        discarded: ConformerId,
    },
}

/// A merged record plus whatever conflicts surfaced while merging it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub record: Conformer,
    pub conflicts: Vec<MergeConflict>,
}

// ---------------------------------------------------------------------------
// Group merge
// ---------------------------------------------------------------------------

/// Merge every partial record of one group into a canonical record.
///
/// Structural violations (wrong id, duplicate same-stage source, malformed
/// partial, topology mismatch) are fatal for the group; numeric disagreement
/// is captured in the returned conflict list and never aborts the merge.
pub fn merge_group(
    id: ConformerId,
    partials: Vec<PartialRecord>,
    tolerance: f64,
    metrics: &mut Metrics,
) -> Result<MergeOutcome, EngineError> {
    let mut stage1: Option<Conformer> = None;
    let mut stage2: Option<Conformer> = None;
    let mut duplicate_of: BTreeSet<ConformerId> = BTreeSet::new();
    let mut duplicated_by: BTreeSet<ConformerId> = BTreeSet::new();

    for partial in partials {
        if partial.record.id != id {
            return Err(EngineError::WrongGroup {
                expected: id,
                found: partial.record.id,
            });
        }
        match partial.origin {
            Origin::Stage1 => {
                validate_stage_partial(&partial.record)?;
                if stage1.replace(partial.record).is_some() {
                    return Err(EngineError::DuplicateSource {
                        id,
                        origin: Origin::Stage1,
                    });
                }
            }
            Origin::Stage2 => {
                validate_stage_partial(&partial.record)?;
                if stage2.replace(partial.record).is_some() {
                    return Err(EngineError::DuplicateSource {
                        id,
                        origin: Origin::Stage2,
                    });
                }
            }
            Origin::Duplicate => {
                // Markers carry only duplicate linkage; copied verbatim.
                duplicate_of.extend(partial.record.duplicate_of.iter().copied());
                duplicated_by.extend(partial.record.duplicated_by);
            }
        }
    }

    let mut conflicts = Vec::new();

    let mut record = match (stage1, stage2) {
        (Some(s1), Some(s2)) => {
            let (merged, conflict) = merge_stages(s1, s2, tolerance)?;
            if let Some(row) = conflict {
                metrics.incr("merge_conflict");
                conflicts.push(MergeConflict::Fields(row));
            }
            merged
        }
        (Some(s1), None) => s1,
        (None, Some(s2)) => s2,
        // Only markers: a degenerate record carrying the duplicate linkage.
        (None, None) => Conformer::new(id),
    };

    duplicate_of.extend(record.duplicate_of.iter().copied());
    duplicated_by.extend(record.duplicated_by);
    record.duplicate_of = duplicate_of;
    record.duplicated_by = duplicated_by.iter().next().copied();
    if let Some(kept) = record.duplicated_by {
        // Disagreeing markers: smallest id wins, the rest are reported.
        for &discarded in duplicated_by.iter().skip(1) {
            metrics.incr("duplicated_by_conflict");
            conflicts.push(MergeConflict::DuplicatedBy {
                id,
                kept,
                discarded,
            });
        }
    }

    metrics.incr("merged_records");
    Ok(MergeOutcome { record, conflicts })
}

fn validate_stage_partial(record: &Conformer) -> Result<(), EngineError> {
    if record.topologies.len() > 1 {
        return Err(EngineError::MalformedPartial {
            id: record.id,
            detail: format!("{} topologies before merge", record.topologies.len()),
        });
    }
    if record.initial_geometries.len() > 1 {
        return Err(EngineError::MalformedPartial {
            id: record.id,
            detail: format!(
                "{} initial geometries before merge",
                record.initial_geometries.len()
            ),
        });
    }
    Ok(())
}

/// Merge a stage-1 and a stage-2 record for the same id.
///
/// At most one conflict row comes out of a pair: the row is a full snapshot
/// of both sides, emitted once if *any* compared field disagrees.
fn merge_stages(
    stage1: Conformer,
    stage2: Conformer,
    tolerance: f64,
) -> Result<(Conformer, Option<ConflictRecord>), EngineError> {
    if let (Some(t1), Some(t2)) = (stage1.primary_topology(), stage2.primary_topology()) {
        if t1 != t2 {
            return Err(EngineError::TopologyMismatch { id: stage1.id });
        }
    }

    let mut disagreement = false;

    // Float fields present on both sides: tolerance check, except the
    // stage-2 unset sentinel which is always accepted silently.
    for (name, &a) in &stage1.properties {
        if let Some(&b) = stage2.properties.get(name) {
            if b == UNSET_SENTINEL {
                continue;
            }
            if (a - b).abs() > tolerance {
                disagreement = true;
            }
        }
    }

    // The four stage-1 status codes are compared exactly.
    let (e1, e2) = (&stage1.errors, &stage2.errors);
    if e1.opt_status != e2.opt_status
        || e1.coord_check != e2.coord_check
        || e1.connectivity_check != e2.connectivity_check
        || e1.frequency_check != e2.frequency_check
    {
        disagreement = true;
    }

    // Geometry presence must agree.
    if stage1.has_initial_geometry() != stage2.has_initial_geometry()
        || stage1.has_optimized_geometry() != stage2.has_optimized_geometry()
    {
        disagreement = true;
    }

    let conflict = disagreement.then(|| ConflictRecord {
        id: stage1.id,
        stage1: ConflictSide::snapshot(&stage1),
        stage2: ConflictSide::snapshot(&stage2),
    });

    // Stage-2 wins on everything it carries; stage-1-only data is layered in
    // underneath so nothing is dropped.
    let mut merged = stage2;
    for (name, value) in stage1.properties {
        merged.properties.entry(name).or_insert(value);
    }
    if merged.topologies.is_empty() {
        merged.topologies = stage1.topologies;
    }
    if merged.initial_geometries.is_empty() {
        merged.initial_geometries = stage1.initial_geometries;
    }
    if merged.optimized_geometry.is_none() {
        merged.optimized_geometry = stage1.optimized_geometry;
    }
    merged.duplicate_of.extend(stage1.duplicate_of);
    if merged.duplicated_by.is_none() {
        merged.duplicated_by = stage1.duplicated_by;
    }

    Ok((merged, conflict))
}
