//! Duplicate resolution.
//!
//! Second grouping pass after merge + classification. A record marked as a
//! duplicate contributes a copy to its primary's group (and still travels on
//! as its own record, carrying its duplicate fate); an unmarked record forms
//! the group for its own id. The primary absorbs the provenance of every
//! duplicate pointing at it.

use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::model::{Conformer, ConformerId};

/// The resolution group a record belongs to: its primary's id when marked
/// duplicate, its own id otherwise. Marked records additionally bypass
/// grouping and continue in the output stream unchanged.
pub fn resolution_key(record: &Conformer) -> ConformerId {
    record.duplicated_by.unwrap_or(record.id)
}

/// Fold a resolution group into its primary record.
///
/// Exactly one member must be unmarked (no `duplicated_by`) and must carry
/// the group id; every other member must point at the group id. For each
/// absorbed duplicate: its id joins the primary's `duplicate_of`; its first
/// initial geometry is copied over when both share a topology. Copying across
/// different topologies needs an atom correspondence that does not exist yet,
/// so that path only counts (`dup_diff_topology_unmatched`).
pub fn resolve_group(
    key: ConformerId,
    members: Vec<Conformer>,
    metrics: &mut Metrics,
) -> Result<Conformer, EngineError> {
    let primary_count = members.iter().filter(|m| m.duplicated_by.is_none()).count();
    if primary_count != 1 {
        return Err(EngineError::PrimaryCount {
            key,
            found: primary_count,
        });
    }

    let mut primary: Option<Conformer> = None;
    let mut absorbed: Vec<Conformer> = Vec::new();
    for member in members {
        match member.duplicated_by {
            None => {
                if member.id != key {
                    return Err(EngineError::WrongPrimary { key, id: member.id });
                }
                primary = Some(member);
            }
            Some(target) => {
                if target != key {
                    return Err(EngineError::ForeignMember { key, id: member.id });
                }
                absorbed.push(member);
            }
        }
    }
    // The count check above guarantees the primary exists here.
    let mut primary = primary.ok_or(EngineError::PrimaryCount { key, found: 0 })?;

    // Absorb in id order so the geometry append order never depends on how
    // the group was assembled.
    absorbed.sort_by_key(|m| m.id);
    for duplicate in absorbed {
        primary.duplicate_of.insert(duplicate.id);
        if duplicate.id.topology_id() == key.topology_id() {
            match duplicate.initial_geometries.first() {
                Some(geometry) => {
                    primary.initial_geometries.push(geometry.clone());
                    metrics.incr("dup_same_topology");
                }
                None => metrics.incr("dup_missing_geometry"),
            }
        } else {
            // Different topology: no atom correspondence available.
            metrics.incr("dup_diff_topology_unmatched");
        }
    }

    Ok(primary)
}
