//! `reconform run` — the pipeline driver.
//!
//! Stage order mirrors the dataflow: read + partition inputs, merge per id,
//! classify + canonical audit, resolve duplicates, aggregate summaries and
//! stats, project tiered views, write artifacts. Fatal group errors are
//! logged and counted but never abort the job; the exit code reports them at
//! the end.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use reconform_config::JobConfig;
use reconform_engine::duplicates::{resolution_key, resolve_group};
use reconform_engine::merge::{merge_group, ConflictRecord, MergeConflict};
use reconform_engine::model::{Conformer, ConformerId, Origin, PartialRecord, TopologySummary};
use reconform_engine::summary::{combine_summaries, summaries_for};
use reconform_engine::{canonical, filter, stats, Metrics};
use reconform_io::records::ParseOutcome;
use reconform_io::{duplicates as duplicate_list, records, report, topology_csv, IoError};

use crate::exit_codes::EXIT_INPUT;
use crate::CliError;

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub counts: RunCounts,
    pub group_errors: Vec<GroupError>,
    pub metrics: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct RunMeta {
    pub job: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Default, Serialize)]
pub struct RunCounts {
    pub stage1_parsed: usize,
    pub stage1_known_error: usize,
    pub stage1_unknown_error: usize,
    pub stage2_parsed: usize,
    pub stage2_known_error: usize,
    pub stage2_unknown_error: usize,
    pub duplicate_markers: usize,
    pub groups: usize,
    pub merged: usize,
    pub merge_conflicts: usize,
    pub duplicated_by_conflicts: usize,
    pub canonical_mismatches: usize,
    pub resolved: usize,
    pub summary_rows: usize,
    pub complete_records: usize,
    pub standard_records: usize,
}

/// One group that failed structurally and was skipped.
#[derive(Debug, Serialize)]
pub struct GroupError {
    pub key: ConformerId,
    pub phase: &'static str,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn artifact(stem: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", stem.display(), suffix))
}

fn input_err(err: IoError) -> CliError {
    CliError {
        code: EXIT_INPUT,
        message: err.to_string(),
        hint: None,
    }
}

/// Run the whole job. Input paths are resolved relative to `base_dir` (the
/// config file's directory).
pub fn run_job(config: &JobConfig, base_dir: &Path) -> Result<RunReport, CliError> {
    let stem = resolve_path(base_dir, &config.output.stem);
    if let Some(parent) = stem.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| CliError {
                code: EXIT_INPUT,
                message: format!("cannot create output directory: {e}"),
                hint: None,
            })?;
        }
    }

    let mut metrics = Metrics::new();
    let mut counts = RunCounts::default();
    let mut group_errors: Vec<GroupError> = Vec::new();

    // ---- read + partition the stage streams --------------------------------
    let mut partials: Vec<PartialRecord> = Vec::new();
    let stage_inputs = [
        (Origin::Stage1, &config.inputs.stage1, "stage1"),
        (Origin::Stage2, &config.inputs.stage2, "stage2"),
    ];
    for (origin, input, label) in stage_inputs {
        let Some(path) = input else { continue };
        let path = resolve_path(base_dir, path);
        let outcomes = records::read_partial_records(&path, origin).map_err(input_err)?;

        let mut parsed = 0usize;
        let mut known: Vec<String> = Vec::new();
        let mut unknown: Vec<String> = Vec::new();
        for outcome in outcomes {
            match outcome {
                ParseOutcome::Parsed(partial) => {
                    partials.push(partial);
                    parsed += 1;
                }
                ParseOutcome::KnownError { line, raw, reason } => {
                    warn!("{label} line {line}: {reason}");
                    known.push(raw);
                }
                ParseOutcome::UnknownError { line, raw, reason } => {
                    warn!("{label} line {line}: unparseable: {reason}");
                    unknown.push(raw);
                }
            }
        }

        match origin {
            Origin::Stage1 => {
                counts.stage1_parsed = parsed;
                counts.stage1_known_error = known.len();
                counts.stage1_unknown_error = unknown.len();
            }
            _ => {
                counts.stage2_parsed = parsed;
                counts.stage2_known_error = known.len();
                counts.stage2_unknown_error = unknown.len();
            }
        }

        // Audit files for the raw offending lines, one per error class.
        records::write_raw_lines(
            &artifact(&stem, &format!("_{label}_known_error.jsonl")),
            known.iter().map(String::as_str),
        )
        .map_err(input_err)?;
        records::write_raw_lines(
            &artifact(&stem, &format!("_{label}_unknown_error.jsonl")),
            unknown.iter().map(String::as_str),
        )
        .map_err(input_err)?;
        info!("{label}: {parsed} records read from {}", path.display());
    }

    // ---- duplicate list ----------------------------------------------------
    if let Some(path) = &config.inputs.duplicates {
        let path = resolve_path(base_dir, path);
        let markers = duplicate_list::read_duplicate_markers(&path).map_err(input_err)?;
        counts.duplicate_markers = markers.len();
        partials.extend(markers);
    }

    // ---- merge per conformer id -------------------------------------------
    let mut groups: BTreeMap<ConformerId, Vec<PartialRecord>> = BTreeMap::new();
    for partial in partials {
        groups.entry(partial.record.id).or_default().push(partial);
    }
    counts.groups = groups.len();

    let mut merged_records: Vec<Conformer> = Vec::new();
    let mut conflict_rows: Vec<ConflictRecord> = Vec::new();
    for (id, group) in groups {
        match merge_group(id, group, config.tolerance.absolute, &mut metrics) {
            Ok(outcome) => {
                for conflict in outcome.conflicts {
                    match conflict {
                        MergeConflict::Fields(row) => {
                            counts.merge_conflicts += 1;
                            conflict_rows.push(row);
                        }
                        MergeConflict::DuplicatedBy { id, kept, discarded } => {
                            warn!(
                                "conformer {id}: duplicate markers disagree, kept {kept} over {discarded}"
                            );
                            counts.duplicated_by_conflicts += 1;
                        }
                    }
                }
                merged_records.push(outcome.record);
            }
            Err(err) => {
                warn!("merge failed for group {id}: {err}");
                metrics.incr("merge_group_failed");
                group_errors.push(GroupError {
                    key: id,
                    phase: "merge",
                    error: err.to_string(),
                });
            }
        }
    }
    counts.merged = merged_records.len();

    // ---- fate + canonical audit -------------------------------------------
    let mut canonical_rows = Vec::new();
    for record in &mut merged_records {
        if let Some(row) = canonical::update_record(record) {
            metrics.incr("canonical_mismatch");
            canonical_rows.push(row);
        }
    }
    counts.canonical_mismatches = canonical_rows.len();

    // ---- duplicate resolution ---------------------------------------------
    // Marked records contribute a copy to their primary's group and still
    // travel on as their own record (their duplicate fate feeds the summary
    // counters and the complete view).
    let mut resolution_groups: BTreeMap<ConformerId, Vec<Conformer>> = BTreeMap::new();
    let mut passthrough: Vec<Conformer> = Vec::new();
    for record in merged_records {
        if record.duplicated_by.is_some() {
            resolution_groups
                .entry(resolution_key(&record))
                .or_default()
                .push(record.clone());
            passthrough.push(record);
        } else {
            resolution_groups.entry(record.id).or_default().push(record);
        }
    }

    let mut final_records: Vec<Conformer> = Vec::new();
    for (key, members) in resolution_groups {
        match resolve_group(key, members, &mut metrics) {
            Ok(record) => final_records.push(record),
            Err(err) => {
                warn!("duplicate resolution failed for group {key}: {err}");
                metrics.incr("resolve_group_failed");
                group_errors.push(GroupError {
                    key,
                    phase: "resolve",
                    error: err.to_string(),
                });
            }
        }
    }
    final_records.extend(passthrough);
    final_records.sort_by_key(|record| record.id);
    counts.resolved = final_records.len();

    // ---- topology summaries ------------------------------------------------
    let mut summary_rows: Vec<TopologySummary> = Vec::new();
    if let Some(path) = &config.inputs.topologies {
        let path = resolve_path(base_dir, path);
        let topologies = topology_csv::read_topologies(&path).map_err(input_err)?;
        info!("{} bare topologies read from {}", topologies.len(), path.display());
        summary_rows.extend(topologies.into_iter().map(TopologySummary::bare));
    }
    for record in &final_records {
        match summaries_for(record) {
            Ok(rows) => summary_rows.extend(rows),
            Err(err) => {
                warn!("summary emission failed for {}: {err}", record.id);
                group_errors.push(GroupError {
                    key: record.id,
                    phase: "summary",
                    error: err.to_string(),
                });
            }
        }
    }
    let combined = combine_summaries(summary_rows);
    counts.summary_rows = combined.len();

    // ---- keyed stats -------------------------------------------------------
    let stat_counts = stats::count_stats(final_records.iter().flat_map(stats::stat_values));

    // ---- tiered views ------------------------------------------------------
    let complete: Vec<Conformer> = final_records.iter().map(filter::to_complete).collect();
    let standard: Vec<Conformer> = final_records.iter().filter_map(filter::to_standard).collect();
    counts.complete_records = complete.len();
    counts.standard_records = standard.len();

    // ---- artifacts ---------------------------------------------------------
    report::write_summary_csv(&artifact(&stem, "_summary.csv"), &combined).map_err(input_err)?;
    report::write_conflicts_csv(&artifact(&stem, "_conflicts.csv"), &conflict_rows)
        .map_err(input_err)?;
    report::write_canonical_csv(&artifact(&stem, "_canonical_compare.csv"), &canonical_rows)
        .map_err(input_err)?;
    report::write_stats_csv(&artifact(&stem, "_stats.csv"), &stat_counts).map_err(input_err)?;
    records::write_records_jsonl(&artifact(&stem, "_complete.jsonl"), complete.iter())
        .map_err(input_err)?;
    records::write_records_jsonl(&artifact(&stem, "_standard.jsonl"), standard.iter())
        .map_err(input_err)?;

    info!(
        "job '{}' done: {} merged, {} conflicts, {} group errors",
        config.name,
        counts.merged,
        counts.merge_conflicts,
        group_errors.len()
    );

    Ok(RunReport {
        meta: RunMeta {
            job: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        counts,
        group_errors,
        metrics: metrics.iter().map(|(k, v)| (k.to_string(), v)).collect(),
    })
}

/// Human-readable run summary for the terminal.
pub fn print_human_summary(report: &RunReport) {
    println!("job:      {}", report.meta.job);
    println!(
        "records:  {} stage1 + {} stage2 + {} markers -> {} merged -> {} resolved",
        report.counts.stage1_parsed,
        report.counts.stage2_parsed,
        report.counts.duplicate_markers,
        report.counts.merged,
        report.counts.resolved
    );
    println!(
        "views:    {} complete, {} standard",
        report.counts.complete_records, report.counts.standard_records
    );
    println!(
        "audits:   {} conflicts, {} canonical mismatches, {} parse errors",
        report.counts.merge_conflicts,
        report.counts.canonical_mismatches,
        report.counts.stage1_known_error
            + report.counts.stage1_unknown_error
            + report.counts.stage2_known_error
            + report.counts.stage2_unknown_error
    );
    println!("topology summary rows: {}", report.counts.summary_rows);
    if !report.group_errors.is_empty() {
        println!("group errors ({}):", report.group_errors.len());
        for group_error in &report.group_errors {
            println!(
                "  {} [{}]: {}",
                group_error.key, group_error.phase, group_error.error
            );
        }
    }
}
