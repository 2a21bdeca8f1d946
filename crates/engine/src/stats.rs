//! Keyed count statistics.
//!
//! Each record contributes `(primary_key, secondary_key)` pairs; the driver
//! counts pair occurrences across the run. Zero-valued status codes are
//! reported too, so the output always covers the full code vocabulary.

use std::collections::BTreeMap;

use crate::model::Conformer;

/// Stat pairs for one record: every status code with its value, the fate,
/// and the geometry/duplicate cardinalities.
pub fn stat_values(record: &Conformer) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (name, value) in record.errors.fields() {
        pairs.push((name.to_string(), value.to_string()));
    }
    let fate = record.fate.map(|f| f.as_str()).unwrap_or("undefined");
    pairs.push(("fate".to_string(), fate.to_string()));
    pairs.push((
        "num_initial_geometries".to_string(),
        record.initial_geometries.len().to_string(),
    ));
    pairs.push((
        "num_duplicates".to_string(),
        record.duplicate_of.len().to_string(),
    ));
    pairs
}

/// Count occurrences of each pair, ordered by key.
pub fn count_stats(
    pairs: impl IntoIterator<Item = (String, String)>,
) -> BTreeMap<(String, String), u64> {
    let mut counts = BTreeMap::new();
    for pair in pairs {
        *counts.entry(pair).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConformerId, Fate, Geometry};

    #[test]
    fn reports_zero_valued_codes() {
        let record = Conformer::new(ConformerId(618451001));
        let pairs = stat_values(&record);
        assert!(pairs.contains(&("atomic_analysis".into(), "0".into())));
        assert!(pairs.contains(&("opt_status".into(), "1".into())));
        assert!(pairs.contains(&("fate".into(), "undefined".into())));
    }

    #[test]
    fn cardinalities_and_fate() {
        let mut record = Conformer::new(ConformerId(618451001));
        record.fate = Some(Fate::Success);
        record.initial_geometries = vec![
            Geometry { positions: vec![] },
            Geometry { positions: vec![] },
        ];
        record.duplicate_of.insert(ConformerId(618451002));

        let pairs = stat_values(&record);
        assert!(pairs.contains(&("fate".into(), "success".into())));
        assert!(pairs.contains(&("num_initial_geometries".into(), "2".into())));
        assert!(pairs.contains(&("num_duplicates".into(), "1".into())));
    }

    #[test]
    fn counting_folds_pairs() {
        let a = Conformer::new(ConformerId(618451001));
        let b = Conformer::new(ConformerId(618451002));
        let counts = count_stats(
            stat_values(&a).into_iter().chain(stat_values(&b)),
        );
        assert_eq!(counts[&("opt_status".to_string(), "1".to_string())], 2);
        assert_eq!(counts[&("fate".to_string(), "undefined".to_string())], 2);
    }
}
