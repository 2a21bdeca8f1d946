//! Per-topology summary aggregation.
//!
//! Each resolved record emits one delta row per topology it references; rows
//! for equal topology ids combine by field-wise addition. Combination is
//! commutative and associative with the all-zero bare row as identity, which
//! lets the surrounding dataflow partition, re-order and re-execute the
//! aggregation freely.

use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::model::{Conformer, Fate, SummaryCounts, TopologyId, TopologySummary};

/// Summary deltas for one classified, resolved record.
///
/// The primary topology row gets `attempted` plus the fate-dependent
/// counters. Additional matched topologies (possible on records classified
/// with calculation errors or success) get only a `detected_match_*`
/// increment. A record with no topology attached emits nothing.
pub fn summaries_for(record: &Conformer) -> Result<Vec<TopologySummary>, EngineError> {
    let fate = record.fate.ok_or(EngineError::Unclassified { id: record.id })?;

    let Some(primary) = record.primary_topology() else {
        return Ok(Vec::new());
    };

    let mut counts = SummaryCounts {
        attempted: 1,
        ..SummaryCounts::default()
    };
    match fate {
        Fate::DuplicateSameTopology => counts.duplicates_same_topology = 1,
        Fate::DuplicateDifferentTopology => counts.duplicates_different_topology = 1,
        Fate::GeometryOptimizationProblem
        | Fate::Disassociated
        | Fate::ForceConstantFailure
        | Fate::DiscardedOther => counts.failed_geometry_optimization = 1,
        Fate::NoCalculationResults => {
            counts.kept_geometry = 1;
            counts.missing_calculation = 1;
        }
        Fate::CalculationWithError => {
            counts.kept_geometry = 1;
            counts.calculation_with_error = 1;
        }
        Fate::Success => {
            counts.kept_geometry = 1;
            counts.calculation_success = 1;
        }
    }

    let mut rows = vec![TopologySummary {
        topology: primary.clone(),
        counts,
    }];

    // Additional matched topologies are observations, not attempts.
    if matches!(fate, Fate::CalculationWithError | Fate::Success) {
        for topology in &record.topologies[1..] {
            let mut counts = SummaryCounts::default();
            if fate == Fate::Success {
                counts.detected_match_success = 1;
            } else {
                counts.detected_match_with_error = 1;
            }
            rows.push(TopologySummary {
                topology: topology.clone(),
                counts,
            });
        }
    }

    Ok(rows)
}

/// Fold summary rows into one row per topology id, in id order.
pub fn combine_summaries(
    rows: impl IntoIterator<Item = TopologySummary>,
) -> Vec<TopologySummary> {
    let mut by_id: BTreeMap<TopologyId, TopologySummary> = BTreeMap::new();
    for row in rows {
        match by_id.get_mut(&row.topology_id()) {
            Some(existing) => existing.combine(&row),
            None => {
                by_id.insert(row.topology_id(), row);
            }
        }
    }
    by_id.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bond, BondOrder, ConformerId, Element, Topology};

    fn topology(id: u64) -> Topology {
        Topology {
            id: TopologyId(id),
            atoms: vec![Element::O, Element::O],
            bonds: vec![Bond { a: 0, b: 1, order: BondOrder::Double }],
            canonical: None,
        }
    }

    fn record(fate: Fate) -> Conformer {
        let mut record = Conformer::new(ConformerId(618451001));
        record.topologies = vec![topology(618451)];
        record.fate = Some(fate);
        record
    }

    #[test]
    fn unclassified_record_is_an_error() {
        let mut unclassified = record(Fate::Success);
        unclassified.fate = None;
        assert_eq!(
            summaries_for(&unclassified).unwrap_err(),
            EngineError::Unclassified { id: ConformerId(618451001) }
        );
    }

    #[test]
    fn duplicate_same_topology_row() {
        let rows = summaries_for(&record(Fate::DuplicateSameTopology)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].counts.attempted, 1);
        assert_eq!(rows[0].counts.duplicates_same_topology, 1);
        assert_eq!(rows[0].counts.kept_geometry, 0);
    }

    #[test]
    fn duplicate_different_topology_row() {
        let rows = summaries_for(&record(Fate::DuplicateDifferentTopology)).unwrap();
        assert_eq!(rows[0].counts.attempted, 1);
        assert_eq!(rows[0].counts.duplicates_different_topology, 1);
    }

    #[test]
    fn geometry_failure_rows() {
        for fate in [
            Fate::GeometryOptimizationProblem,
            Fate::Disassociated,
            Fate::ForceConstantFailure,
            Fate::DiscardedOther,
        ] {
            let rows = summaries_for(&record(fate)).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].counts.attempted, 1);
            assert_eq!(rows[0].counts.failed_geometry_optimization, 1);
        }
    }

    #[test]
    fn missing_calculation_row() {
        let rows = summaries_for(&record(Fate::NoCalculationResults)).unwrap();
        assert_eq!(rows[0].counts.attempted, 1);
        assert_eq!(rows[0].counts.kept_geometry, 1);
        assert_eq!(rows[0].counts.missing_calculation, 1);
    }

    #[test]
    fn error_with_detected_match() {
        let mut rec = record(Fate::CalculationWithError);
        rec.topologies.push(topology(123));

        let rows = summaries_for(&rec).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].topology_id(), TopologyId(618451));
        assert_eq!(rows[0].counts.attempted, 1);
        assert_eq!(rows[0].counts.kept_geometry, 1);
        assert_eq!(rows[0].counts.calculation_with_error, 1);
        assert_eq!(rows[0].counts.detected_match_with_error, 0);

        assert_eq!(rows[1].topology_id(), TopologyId(123));
        assert_eq!(rows[1].counts.attempted, 0);
        assert_eq!(rows[1].counts.kept_geometry, 0);
        assert_eq!(rows[1].counts.calculation_with_error, 0);
        assert_eq!(rows[1].counts.detected_match_with_error, 1);
    }

    #[test]
    fn success_with_detected_match() {
        let mut rec = record(Fate::Success);
        rec.topologies.push(topology(123));

        let rows = summaries_for(&rec).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].counts.calculation_success, 1);
        assert_eq!(rows[1].counts.detected_match_success, 1);
        assert_eq!(rows[1].counts.attempted, 0);
    }

    #[test]
    fn combine_is_order_insensitive() {
        let a = summaries_for(&record(Fate::Success)).unwrap();
        let b = summaries_for(&record(Fate::CalculationWithError)).unwrap();
        let c = vec![TopologySummary::bare(topology(618451))];

        let mut one = Vec::new();
        one.extend(a.clone());
        one.extend(b.clone());
        one.extend(c.clone());

        let mut other = Vec::new();
        other.extend(c);
        other.extend(b);
        other.extend(a);

        let combined_one = combine_summaries(one);
        let combined_other = combine_summaries(other);
        assert_eq!(combined_one, combined_other);
        assert_eq!(combined_one.len(), 1);
        assert_eq!(combined_one[0].counts.attempted, 2);
        assert_eq!(combined_one[0].counts.calculation_success, 1);
        assert_eq!(combined_one[0].counts.calculation_with_error, 1);
    }

    #[test]
    fn bare_row_is_identity() {
        let mut summary = summaries_for(&record(Fate::Success)).unwrap().remove(0);
        let before = summary.clone();
        summary.combine(&TopologySummary::bare(topology(618451)));
        assert_eq!(summary, before);
    }

    #[test]
    fn bare_topologies_survive_with_zero_counts() {
        let combined = combine_summaries(vec![TopologySummary::bare(topology(42))]);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].counts, SummaryCounts::default());
    }
}
