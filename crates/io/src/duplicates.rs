//! Duplicate-relationship lists.
//!
//! Each line names two conformers in the long identifier format
//! `x{heavy:02}_{stoichiometry}.{topology_id}.{index}`; the first was kept,
//! the second discarded in its favor. Every line becomes one duplicate-marker
//! record keyed by the discarded id.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use reconform_engine::model::{ConformerId, PartialRecord};

use crate::IoError;

/// Decompose a long identifier into (stoichiometry, topology id, index).
pub fn parse_long_identifier(text: &str) -> Result<(String, u64, u64), String> {
    let mut parts = text.split('.');
    let (Some(head), Some(topology), Some(index), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected 3 dot-separated fields in '{text}'"));
    };

    let stoichiometry = head
        .strip_prefix('x')
        .and_then(|rest| rest.split_once('_'))
        .map(|(_, stoichiometry)| stoichiometry.to_string())
        .ok_or_else(|| format!("malformed composition prefix in '{text}'"))?;

    let topology: u64 = topology
        .parse()
        .map_err(|_| format!("bad topology id in '{text}'"))?;
    let index: u64 = index
        .parse()
        .map_err(|_| format!("bad conformer index in '{text}'"))?;

    Ok((stoichiometry, topology, index))
}

/// Conformer id recombined from a long identifier.
pub fn conformer_id_of(text: &str) -> Result<ConformerId, String> {
    let (_, topology, index) = parse_long_identifier(text)?;
    Ok(ConformerId(topology * 1000 + index))
}

/// Parse one `kept discarded` line into (kept id, discarded id).
pub fn parse_duplicate_line(line: &str) -> Result<(ConformerId, ConformerId), String> {
    let mut tokens = line.split_whitespace();
    let (Some(kept), Some(discarded), None) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err("expected exactly two identifiers".to_string());
    };
    Ok((conformer_id_of(kept)?, conformer_id_of(discarded)?))
}

/// Read a duplicate list into marker records, one per line, keyed by the
/// discarded id.
pub fn read_duplicate_markers(path: &Path) -> Result<Vec<PartialRecord>, IoError> {
    let file = File::open(path).map_err(|e| IoError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut markers = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| IoError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let (kept, discarded) =
            parse_duplicate_line(&line).map_err(|message| IoError::Format {
                path: path.display().to_string(),
                line: index + 1,
                message,
            })?;
        markers.push(PartialRecord::duplicate_marker(discarded, kept));
    }
    log::debug!("{}: {} duplicate markers read", path.display(), markers.len());
    Ok(markers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconform_engine::model::Origin;
    use std::io::Write as _;

    #[test]
    fn long_identifier_decomposes() {
        let (stoichiometry, topology, index) =
            parse_long_identifier("x07_c2n2o2fh3.224227.004").unwrap();
        assert_eq!(stoichiometry, "c2n2o2fh3");
        assert_eq!(topology, 224227);
        assert_eq!(index, 4);
        assert_eq!(
            conformer_id_of("x07_c2n2o2fh3.224227.004").unwrap(),
            ConformerId(224227004)
        );
    }

    #[test]
    fn malformed_identifiers_rejected() {
        assert!(parse_long_identifier("c2n2o2fh3.224227.004").is_err());
        assert!(parse_long_identifier("x07_c2n2o2fh3.224227").is_err());
        assert!(parse_long_identifier("x07_c2n2o2fh3.abc.004").is_err());
    }

    #[test]
    fn line_yields_kept_then_discarded() {
        let (kept, discarded) = parse_duplicate_line(
            "x07_c2n2o2fh3.224227.004 x07_c2n2o2fh3.224176.005",
        )
        .unwrap();
        assert_eq!(kept, ConformerId(224227004));
        assert_eq!(discarded, ConformerId(224176005));
    }

    #[test]
    fn file_becomes_markers_keyed_by_discarded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x07_c2n2o2fh3.224227.004 x07_c2n2o2fh3.224176.005").unwrap();
        writeln!(file, "x07_c2n2o2fh3.260543.005 x07_c2n2o2fh3.224050.001").unwrap();

        let markers = read_duplicate_markers(file.path()).unwrap();
        assert_eq!(markers.len(), 2);

        assert_eq!(markers[0].origin, Origin::Duplicate);
        assert_eq!(markers[0].record.id, ConformerId(224176005));
        assert_eq!(markers[0].record.duplicated_by, Some(ConformerId(224227004)));
        assert!(markers[0].record.topologies.is_empty());
        assert!(markers[0].record.properties.is_empty());

        assert_eq!(markers[1].record.id, ConformerId(224050001));
        assert_eq!(markers[1].record.duplicated_by, Some(ConformerId(260543005)));
    }

    #[test]
    fn bad_line_is_a_format_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "only_one_token").unwrap();

        let err = read_duplicate_markers(file.path()).unwrap_err();
        assert!(matches!(err, IoError::Format { line: 1, .. }));
    }
}
