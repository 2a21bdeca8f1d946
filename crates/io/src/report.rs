//! CSV report writers.
//!
//! Every report has a fixed, declared column order; downstream tooling keys
//! on these headers.

use std::collections::BTreeMap;
use std::path::Path;

use reconform_engine::canonical::CanonicalMismatch;
use reconform_engine::merge::{ConflictRecord, ConflictSide};
use reconform_engine::model::{SummaryCounts, TopologySummary};

use crate::IoError;

fn open_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, IoError> {
    csv::Writer::from_path(path).map_err(|e| IoError::Csv {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn csv_err(path: &Path, e: csv::Error) -> IoError {
    IoError::Csv {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Topology summary rows: `topology_id` plus the ten counters in declared
/// order, sorted by topology id.
pub fn write_summary_csv(path: &Path, summaries: &[TopologySummary]) -> Result<(), IoError> {
    let mut writer = open_writer(path)?;

    let mut header = vec!["topology_id".to_string()];
    header.extend(SummaryCounts::FIELD_NAMES.iter().map(|s| s.to_string()));
    writer.write_record(&header).map_err(|e| csv_err(path, e))?;

    let mut sorted: Vec<&TopologySummary> = summaries.iter().collect();
    sorted.sort_by_key(|s| s.topology_id());
    for summary in sorted {
        let mut row = vec![summary.topology_id().to_string()];
        row.extend(summary.counts.values().iter().map(|v| v.to_string()));
        writer.write_record(&row).map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| IoError::io(path, e))
}

fn side_columns(side: &ConflictSide) -> Vec<String> {
    vec![
        side.opt_status.to_string(),
        side.coord_check.to_string(),
        side.connectivity_check.to_string(),
        side.frequency_check.to_string(),
        side.initial_geometry_energy.to_string(),
        side.initial_geometry_gradient_norm.to_string(),
        side.optimized_geometry_energy.to_string(),
        side.optimized_geometry_gradient_norm.to_string(),
        side.has_initial_geometry.to_string(),
        side.has_optimized_geometry.to_string(),
    ]
}

const SIDE_FIELDS: [&str; 10] = [
    "opt_status",
    "coord_check",
    "connectivity_check",
    "frequency_check",
    "initial_geometry_energy",
    "initial_geometry_gradient_norm",
    "optimized_geometry_energy",
    "optimized_geometry_gradient_norm",
    "has_initial_geometry",
    "has_optimized_geometry",
];

/// Merge conflict rows: the id followed by the stage-1 snapshot and the
/// stage-2 snapshot.
pub fn write_conflicts_csv(path: &Path, conflicts: &[ConflictRecord]) -> Result<(), IoError> {
    let mut writer = open_writer(path)?;

    let mut header = vec!["conformer_id".to_string()];
    for prefix in ["stage1", "stage2"] {
        header.extend(SIDE_FIELDS.iter().map(|f| format!("{prefix}_{f}")));
    }
    writer.write_record(&header).map_err(|e| csv_err(path, e))?;

    for conflict in conflicts {
        let mut row = vec![conflict.id.to_string()];
        row.extend(side_columns(&conflict.stage1));
        row.extend(side_columns(&conflict.stage2));
        writer.write_record(&row).map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| IoError::io(path, e))
}

/// Canonical-form audit rows.
pub fn write_canonical_csv(path: &Path, rows: &[CanonicalMismatch]) -> Result<(), IoError> {
    let mut writer = open_writer(path)?;
    writer
        .write_record([
            "conformer_id",
            "result",
            "given",
            "with_hydrogens",
            "without_hydrogens",
        ])
        .map_err(|e| csv_err(path, e))?;

    for row in rows {
        writer
            .write_record([
                row.id.to_string(),
                row.result.to_string(),
                row.given.clone(),
                row.with_hydrogens.clone(),
                row.without_hydrogens.clone(),
            ])
            .map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| IoError::io(path, e))
}

/// Keyed count statistics: `primary_key,secondary_key,count`.
pub fn write_stats_csv(
    path: &Path,
    counts: &BTreeMap<(String, String), u64>,
) -> Result<(), IoError> {
    let mut writer = open_writer(path)?;
    writer
        .write_record(["primary_key", "secondary_key", "count"])
        .map_err(|e| csv_err(path, e))?;

    for ((primary, secondary), count) in counts {
        writer
            .write_record([primary.as_str(), secondary.as_str(), count.to_string().as_str()])
            .map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| IoError::io(path, e))
}
