//! Fate classification.
//!
//! Ordered rules, first match wins. The status-code quirks (`opt_status` 3
//! counting as clean, the inverted `normal_mode_rank` polarity) are preserved
//! legacy semantics; see `ErrorCodes::has_calculation_errors`.

use crate::model::{Conformer, Fate};
use crate::registry;

/// Classify a record into its terminal fate. Pure and total: every record
/// maps to exactly one fate, and the same record always maps to the same one.
pub fn classify(record: &Conformer) -> Fate {
    if let Some(kept) = record.duplicated_by {
        if kept.topology_id() == record.id.topology_id() {
            return Fate::DuplicateSameTopology;
        }
        return Fate::DuplicateDifferentTopology;
    }

    if !registry::has_stage2_results(&record.properties) {
        return Fate::NoCalculationResults;
    }

    // Known geometry-optimization failure classes, by status value.
    match record.errors.opt_status {
        2 => return Fate::GeometryOptimizationProblem,
        5 => return Fate::Disassociated,
        4 => return Fate::ForceConstantFailure,
        6 => return Fate::DiscardedOther,
        _ => {}
    }

    if record.errors.has_calculation_errors() {
        return Fate::CalculationWithError;
    }

    Fate::Success
}
