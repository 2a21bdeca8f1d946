//! JSONL record streams.
//!
//! One partial record per line. Parsing partitions each line into parsed /
//! known error / unknown error: a line that decodes but violates the record
//! contract (wrong topology count, id that disagrees with its topology id)
//! is a known error, an undecodable line is unknown. Both keep the raw line
//! so the driver can write it to the matching audit file.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use reconform_engine::model::{Conformer, Origin, PartialRecord};

use crate::IoError;

/// Per-line outcome of reading a record stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(PartialRecord),
    /// Decoded but violates the record contract.
    KnownError {
        line: usize,
        raw: String,
        reason: String,
    },
    /// Undecodable line.
    UnknownError {
        line: usize,
        raw: String,
        reason: String,
    },
}

/// Read a stage record stream, tagging every record with `origin`.
pub fn read_partial_records(path: &Path, origin: Origin) -> Result<Vec<ParseOutcome>, IoError> {
    let file = File::open(path).map_err(|e| IoError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut outcomes = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| IoError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        outcomes.push(parse_line(&line, index + 1, origin));
    }
    log::debug!("{}: {} lines read", path.display(), outcomes.len());
    Ok(outcomes)
}

fn parse_line(raw: &str, line: usize, origin: Origin) -> ParseOutcome {
    let record: Conformer = match serde_json::from_str(raw) {
        Ok(record) => record,
        Err(err) => {
            return ParseOutcome::UnknownError {
                line,
                raw: raw.to_string(),
                reason: err.to_string(),
            }
        }
    };

    if let Some(reason) = contract_violation(&record) {
        return ParseOutcome::KnownError {
            line,
            raw: raw.to_string(),
            reason,
        };
    }

    ParseOutcome::Parsed(PartialRecord { origin, record })
}

/// Stage records must carry exactly one topology, and its id must agree with
/// the conformer id.
fn contract_violation(record: &Conformer) -> Option<String> {
    if record.topologies.len() != 1 {
        return Some(format!(
            "expected exactly one topology, found {}",
            record.topologies.len()
        ));
    }
    let declared = record.topologies[0].id;
    if declared != record.id.topology_id() {
        return Some(format!(
            "topology id {declared} disagrees with conformer id {}",
            record.id
        ));
    }
    None
}

/// Write records as JSONL. Returns the number of lines written.
pub fn write_records_jsonl<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a Conformer>,
) -> Result<usize, IoError> {
    let file = File::create(path).map_err(|e| IoError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0;
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| IoError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        writeln!(writer, "{line}").map_err(|e| IoError::io(path, e))?;
        written += 1;
    }
    writer.flush().map_err(|e| IoError::io(path, e))?;
    Ok(written)
}

/// Write raw lines verbatim (parse-error audit files).
pub fn write_raw_lines<'a>(
    path: &Path,
    lines: impl IntoIterator<Item = &'a str>,
) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{line}").map_err(|e| IoError::io(path, e))?;
    }
    writer.flush().map_err(|e| IoError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconform_engine::model::{ConformerId, Element, Topology, TopologyId};

    fn record_json(id: u64, topology_id: u64) -> String {
        let mut record = Conformer::new(ConformerId(id));
        record.topologies = vec![Topology {
            id: TopologyId(topology_id),
            atoms: vec![Element::O, Element::H, Element::H],
            bonds: vec![],
            canonical: None,
        }];
        serde_json::to_string(&record).unwrap()
    }

    fn write_temp(lines: &[String]) -> tempfile::NamedTempFile {
        use std::io::Write as _;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn partitions_parsed_known_unknown() {
        let file = write_temp(&[
            record_json(618451001, 618451),
            record_json(618451002, 999999), // topology id disagrees
            "not json at all".to_string(),
        ]);

        let outcomes = read_partial_records(file.path(), Origin::Stage1).unwrap();
        assert_eq!(outcomes.len(), 3);

        match &outcomes[0] {
            ParseOutcome::Parsed(partial) => {
                assert_eq!(partial.origin, Origin::Stage1);
                assert_eq!(partial.record.id, ConformerId(618451001));
            }
            other => panic!("expected parsed, got {other:?}"),
        }
        match &outcomes[1] {
            ParseOutcome::KnownError { line, reason, .. } => {
                assert_eq!(*line, 2);
                assert!(reason.contains("disagrees"));
            }
            other => panic!("expected known error, got {other:?}"),
        }
        match &outcomes[2] {
            ParseOutcome::UnknownError { line, raw, .. } => {
                assert_eq!(*line, 3);
                assert_eq!(raw, "not json at all");
            }
            other => panic!("expected unknown error, got {other:?}"),
        }
    }

    #[test]
    fn missing_topology_is_known_error() {
        let record = Conformer::new(ConformerId(618451001));
        let file = write_temp(&[serde_json::to_string(&record).unwrap()]);

        let outcomes = read_partial_records(file.path(), Origin::Stage2).unwrap();
        assert!(matches!(outcomes[0], ParseOutcome::KnownError { .. }));
    }

    #[test]
    fn skips_blank_lines() {
        let file = write_temp(&[
            String::new(),
            record_json(618451001, 618451),
            "   ".to_string(),
        ]);
        let outcomes = read_partial_records(file.path(), Origin::Stage1).unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn jsonl_round_trip() {
        let mut record = Conformer::new(ConformerId(618451001));
        record.properties.insert("single_point_energy".into(), -406.6);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let written = write_records_jsonl(&path, [&record]).unwrap();
        assert_eq!(written, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let decoded: Conformer = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(decoded, record);
    }
}
