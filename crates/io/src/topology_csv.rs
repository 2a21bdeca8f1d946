//! Bare topology enumeration from CSV.
//!
//! Columns: `id,num_atoms,atoms_str,connectivity_matrix,hydrogens,canonical`.
//! `atoms_str` spells the heavy atoms two characters each (`N+O O O-`),
//! `connectivity_matrix` is the upper triangle of the heavy-atom bond-order
//! matrix in row-major order, `hydrogens` is one digit per heavy atom.
//! Hydrogens are attached as explicit atoms bonded to their heavy atom.

use std::path::Path;

use reconform_engine::model::{Bond, BondOrder, Element, Topology, TopologyId};

use crate::IoError;

/// Parse the two-characters-per-atom heavy atom string.
pub fn parse_atoms(atoms_str: &str) -> Result<Vec<Element>, String> {
    let chars: Vec<char> = atoms_str.chars().collect();
    if chars.is_empty() {
        return Err("empty atom string".to_string());
    }

    let mut atoms = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let letter = chars[i];
        let modifier = chars.get(i + 1).copied().unwrap_or(' ');
        let element = match (letter, modifier) {
            ('C', ' ') => Element::C,
            ('N', ' ') => Element::N,
            ('N', '+') => Element::NPlus,
            ('O', ' ') => Element::O,
            ('O', '-') => Element::OMinus,
            ('F', ' ') => Element::F,
            ('H', ' ') => Element::H,
            _ => return Err(format!("unknown atom '{letter}{modifier}'")),
        };
        atoms.push(element);
        i += 2;
    }
    Ok(atoms)
}

/// Build a topology from its CSV fields.
///
/// Plain `N`/`O` atoms get their charge inferred from valence after bonding:
/// a nitrogen carrying four bonds is N⁺, an oxygen carrying one is O⁻.
pub fn create_topology(
    id: TopologyId,
    atoms_str: &str,
    matrix: &str,
    hydrogens: &str,
    canonical: Option<String>,
) -> Result<Topology, String> {
    let mut atoms = parse_atoms(atoms_str)?;
    let heavy = atoms.len();

    let expected_len = heavy * heavy.saturating_sub(1) / 2;
    let digits: Vec<u32> = matrix
        .chars()
        .map(|c| c.to_digit(10).ok_or_else(|| format!("bad matrix digit '{c}'")))
        .collect::<Result<_, _>>()?;
    if digits.len() != expected_len {
        return Err(format!(
            "connectivity matrix has {} entries, expected {expected_len}",
            digits.len()
        ));
    }

    let mut bonds = Vec::new();
    let mut cursor = 0;
    for a in 0..heavy {
        for b in a + 1..heavy {
            let order = match digits[cursor] {
                0 => None,
                1 => Some(BondOrder::Single),
                2 => Some(BondOrder::Double),
                3 => Some(BondOrder::Triple),
                n => return Err(format!("bond order {n} out of range")),
            };
            cursor += 1;
            if let Some(order) = order {
                bonds.push(Bond { a, b, order });
            }
        }
    }

    let hydrogen_counts: Vec<u32> = hydrogens
        .chars()
        .map(|c| c.to_digit(10).ok_or_else(|| format!("bad hydrogen digit '{c}'")))
        .collect::<Result<_, _>>()?;
    if hydrogen_counts.len() != heavy {
        return Err(format!(
            "{} hydrogen digits for {heavy} heavy atoms",
            hydrogen_counts.len()
        ));
    }

    // Infer charges on plain atoms before hydrogens are attached explicitly.
    for (index, atom) in atoms.iter_mut().enumerate() {
        let order_sum: u32 = bonds
            .iter()
            .filter(|bond| bond.a == index || bond.b == index)
            .map(|bond| bond.order.as_u8() as u32)
            .sum();
        let valence = order_sum + hydrogen_counts[index];
        match atom {
            Element::N if valence == 4 => *atom = Element::NPlus,
            Element::O if valence == 1 => *atom = Element::OMinus,
            _ => {}
        }
    }

    for (index, &count) in hydrogen_counts.iter().enumerate() {
        for _ in 0..count {
            atoms.push(Element::H);
            bonds.push(Bond {
                a: index,
                b: atoms.len() - 1,
                order: BondOrder::Single,
            });
        }
    }

    Ok(Topology {
        id,
        atoms,
        bonds,
        canonical,
    })
}

/// Read the bare topology enumeration.
pub fn read_topologies(path: &Path) -> Result<Vec<Topology>, IoError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| IoError::Csv {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let headers = reader
        .headers()
        .map_err(|e| IoError::Csv {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
        .clone();
    let column = |name: &str| -> Result<usize, IoError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| IoError::Csv {
                path: path.display().to_string(),
                message: format!("missing column '{name}'"),
            })
    };

    let id_col = column("id")?;
    let num_atoms_col = column("num_atoms")?;
    let atoms_col = column("atoms_str")?;
    let matrix_col = column("connectivity_matrix")?;
    let hydrogens_col = column("hydrogens")?;
    let canonical_col = column("canonical")?;

    let mut topologies = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let line = index + 2; // header is line 1
        let row = row.map_err(|e| IoError::Csv {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let field = |col: usize| row.get(col).unwrap_or("");

        let format_err = |message: String| IoError::Format {
            path: path.display().to_string(),
            line,
            message,
        };

        let id: u64 = field(id_col)
            .parse()
            .map_err(|_| format_err(format!("bad topology id '{}'", field(id_col))))?;
        let declared_heavy: usize = field(num_atoms_col)
            .parse()
            .map_err(|_| format_err(format!("bad atom count '{}'", field(num_atoms_col))))?;

        let canonical = match field(canonical_col) {
            "" => None,
            text => Some(text.to_string()),
        };

        let topology = create_topology(
            TopologyId(id),
            field(atoms_col),
            field(matrix_col),
            field(hydrogens_col),
            canonical,
        )
        .map_err(format_err)?;

        if topology.heavy_atom_count() != declared_heavy {
            return Err(IoError::Format {
                path: path.display().to_string(),
                line,
                message: format!(
                    "declared {declared_heavy} heavy atoms, parsed {}",
                    topology.heavy_atom_count()
                ),
            });
        }
        topologies.push(topology);
    }
    log::debug!("{}: {} topologies read", path.display(), topologies.len());
    Ok(topologies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn parse_explicit_charges() {
        let atoms = parse_atoms("N+O O O-").unwrap();
        assert_eq!(
            atoms,
            vec![Element::NPlus, Element::O, Element::O, Element::OMinus]
        );
    }

    #[test]
    fn simple_topology() {
        // C-N, C-F, C-F, with one H on C and two on N.
        let topology =
            create_topology(TopologyId(7), "C N F F ", "111000", "1200", None).unwrap();
        assert_eq!(topology.heavy_atom_count(), 4);
        assert_eq!(topology.atoms.len(), 7);
        assert_eq!(topology.atoms[4], Element::H);

        // Heavy bonds first, then hydrogens in heavy-atom order.
        assert_eq!(topology.bonds[0], Bond { a: 0, b: 1, order: BondOrder::Single });
        assert_eq!(topology.bonds[1], Bond { a: 0, b: 2, order: BondOrder::Single });
        assert_eq!(topology.bonds[2], Bond { a: 0, b: 3, order: BondOrder::Single });
        assert_eq!(topology.bonds[3], Bond { a: 0, b: 4, order: BondOrder::Single });
        assert_eq!(topology.bonds[4], Bond { a: 1, b: 5, order: BondOrder::Single });
        assert_eq!(topology.bonds[5], Bond { a: 1, b: 6, order: BondOrder::Single });
    }

    #[test]
    fn charge_inference_from_valence() {
        // C=N-N-O with hydrogens 2,0,2,0: the second N carries 4 bonds (N+),
        // the O carries 1 (O-).
        let topology =
            create_topology(TopologyId(8), "C N N O ", "200101", "2020", None).unwrap();
        assert_eq!(topology.atoms[1], Element::N);
        assert_eq!(topology.atoms[2], Element::NPlus);
        assert_eq!(topology.atoms[3], Element::OMinus);
    }

    #[test]
    fn single_heavy_atom() {
        let topology = create_topology(TopologyId(9), "C ", "", "4", None).unwrap();
        assert_eq!(topology.atoms.len(), 5);
        assert_eq!(topology.bonds.len(), 4);
        assert!(topology.bonds.iter().all(|b| b.a == 0));
    }

    #[test]
    fn matrix_length_checked() {
        let err = create_topology(TopologyId(10), "C N ", "11", "00", None).unwrap_err();
        assert!(err.contains("expected 1"));
    }

    #[test]
    fn csv_enumeration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "id,num_atoms,atoms_str,connectivity_matrix,hydrogens,canonical"
        )
        .unwrap();
        writeln!(file, "68,3,C N+O-,310,010,cno").unwrap();
        writeln!(file, "134,4,N+O-F F ,111000,1000,").unwrap();

        let topologies = read_topologies(file.path()).unwrap();
        assert_eq!(topologies.len(), 2);

        assert_eq!(topologies[0].id, TopologyId(68));
        assert_eq!(topologies[0].atoms.len(), 4); // 3 heavy + 1 H
        assert_eq!(topologies[0].canonical.as_deref(), Some("cno"));

        assert_eq!(topologies[1].id, TopologyId(134));
        assert_eq!(topologies[1].atoms.len(), 5); // 4 heavy + 1 H
        assert_eq!(topologies[1].canonical, None);
    }

    #[test]
    fn csv_heavy_count_mismatch_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "id,num_atoms,atoms_str,connectivity_matrix,hydrogens,canonical"
        )
        .unwrap();
        writeln!(file, "68,5,C N+O-,310,010,").unwrap();

        let err = read_topologies(file.path()).unwrap_err();
        assert!(matches!(err, IoError::Format { line: 2, .. }));
    }
}
