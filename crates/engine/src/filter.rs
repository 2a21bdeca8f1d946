//! Availability filtering.
//!
//! Projects a record down to a declared visibility tier set for downstream
//! consumption. Structure, geometry, error codes, duplicate linkage and fate
//! are part of every view; only computed properties are tiered.

use crate::model::{Conformer, Fate, Tier};
use crate::registry;

/// Owned copy of the record retaining only properties whose tier is allowed.
pub fn project(record: &Conformer, allowed: &[Tier]) -> Conformer {
    let mut out = record.clone();
    out.properties
        .retain(|name, _| allowed.contains(&registry::tier_of(name)));
    out
}

/// The "complete" view: everything except internal-only fields.
pub fn to_complete(record: &Conformer) -> Conformer {
    project(record, &[Tier::Standard, Tier::Complete])
}

/// The "standard" view. Produces nothing for records that did not come out
/// of the calculation cleanly: non-primary duplicates and calculation
/// failures are dropped from this view entirely.
pub fn to_standard(record: &Conformer) -> Option<Conformer> {
    if record.duplicated_by.is_some() {
        return None;
    }
    if let Some(fate) = record.fate {
        if fate.is_geometry_failure() || fate == Fate::CalculationWithError {
            return None;
        }
    }
    Some(project(record, &[Tier::Standard]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Conformer, ConformerId};

    fn record() -> Conformer {
        let mut record = Conformer::new(ConformerId(618451001));
        // One field per tier.
        record.properties.insert("single_point_energy".into(), 1.23);
        record.properties.insert("homo_energy".into(), 1.23);
        record
            .properties
            .insert("nuclear_repulsion_energy".into(), 1.23);
        record.fate = Some(Fate::Success);
        record
    }

    #[test]
    fn project_standard_only() {
        let out = project(&record(), &[Tier::Standard]);
        assert!(out.properties.contains_key("single_point_energy"));
        assert!(!out.properties.contains_key("homo_energy"));
        assert!(!out.properties.contains_key("nuclear_repulsion_energy"));
    }

    #[test]
    fn project_complete_and_internal() {
        let out = project(&record(), &[Tier::Complete, Tier::InternalOnly]);
        assert!(!out.properties.contains_key("single_point_energy"));
        assert!(out.properties.contains_key("homo_energy"));
        assert!(out.properties.contains_key("nuclear_repulsion_energy"));
    }

    #[test]
    fn complete_view_drops_internal_only() {
        let out = to_complete(&record());
        assert!(out.properties.contains_key("single_point_energy"));
        assert!(out.properties.contains_key("homo_energy"));
        assert!(!out.properties.contains_key("nuclear_repulsion_energy"));
    }

    #[test]
    fn projection_keeps_everything_but_properties() {
        let mut rec = record();
        rec.duplicate_of.insert(ConformerId(618451002));
        let out = to_standard(&rec).unwrap();
        assert_eq!(out.id, rec.id);
        assert_eq!(out.errors, rec.errors);
        assert_eq!(out.fate, rec.fate);
        assert_eq!(out.duplicate_of, rec.duplicate_of);
    }

    #[test]
    fn standard_drops_error_records() {
        let mut rec = record();
        rec.fate = Some(Fate::CalculationWithError);
        assert!(to_standard(&rec).is_none());

        rec.fate = Some(Fate::Disassociated);
        assert!(to_standard(&rec).is_none());
    }

    #[test]
    fn standard_drops_duplicates() {
        let mut rec = record();
        rec.duplicated_by = Some(ConformerId(618451002));
        assert!(to_standard(&rec).is_none());
    }

    #[test]
    fn standard_keeps_missing_calculation_records() {
        let mut rec = record();
        rec.fate = Some(Fate::NoCalculationResults);
        assert!(to_standard(&rec).is_some());
    }

    #[test]
    fn unknown_property_never_reaches_a_view() {
        let mut rec = record();
        rec.properties.insert("experimental_field".into(), 9.9);
        assert!(!to_complete(&rec).properties.contains_key("experimental_field"));
    }
}
