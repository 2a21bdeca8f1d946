//! Canonical structure forms.
//!
//! Deterministic canonical strings derived from the topology alone: the
//! stoichiometry form groups heavy atoms by element and hydrogen count
//! (`(ch2)4` for cyclobutane), the bare formula drops the hydrogen detail
//! (`c4`). Source-supplied canonical strings are audited against the
//! recomputed form; mismatches go to a side channel and the stored string is
//! replaced, so downstream consumers always see the recomputed form.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::fate::classify;
use crate::model::{Conformer, ConformerId, Topology};

/// Ordering rank of a folded element symbol in canonical strings.
fn element_rank(folded: char) -> u8 {
    match folded {
        'c' => 0,
        'n' => 1,
        'o' => 2,
        'f' => 3,
        _ => 4,
    }
}

/// Canonical stoichiometry with hydrogens: heavy atoms grouped by (element,
/// attached hydrogen count), ordered by element then hydrogen count, with a
/// repeat count suffix. Charged variants fold into their base element.
pub fn stoichiometry(topology: &Topology) -> String {
    let mut groups: BTreeMap<(u8, char, usize), usize> = BTreeMap::new();
    for (index, atom) in topology.atoms.iter().enumerate() {
        if atom.is_hydrogen() {
            continue;
        }
        let folded = atom.folded();
        let hydrogens = topology.hydrogen_count(index);
        *groups
            .entry((element_rank(folded), folded, hydrogens))
            .or_insert(0) += 1;
    }

    let mut out = String::new();
    for ((_, element, hydrogens), count) in groups {
        out.push('(');
        out.push(element);
        match hydrogens {
            0 => {}
            1 => out.push('h'),
            n => {
                out.push('h');
                out.push_str(&n.to_string());
            }
        }
        out.push(')');
        if count > 1 {
            out.push_str(&count.to_string());
        }
    }
    out
}

/// Bare formula without hydrogen grouping: folded element counts in element
/// order, e.g. `c2n` for two carbons and a nitrogen.
pub fn formula(topology: &Topology) -> String {
    let mut counts: BTreeMap<(u8, char), usize> = BTreeMap::new();
    for atom in &topology.atoms {
        if atom.is_hydrogen() {
            continue;
        }
        let folded = atom.folded();
        *counts.entry((element_rank(folded), folded)).or_insert(0) += 1;
    }

    let mut out = String::new();
    for ((_, element), count) in counts {
        out.push(element);
        if count > 1 {
            out.push_str(&count.to_string());
        }
    }
    out
}

/// Composition label: heavy atom count plus the full formula with hydrogens,
/// e.g. `x03_c2nh3`.
pub fn composition(topology: &Topology) -> String {
    let hydrogens = topology
        .atoms
        .iter()
        .filter(|atom| atom.is_hydrogen())
        .count();

    let mut out = format!("x{:02}_{}", topology.heavy_atom_count(), formula(topology));
    match hydrogens {
        0 => {}
        1 => out.push('h'),
        n => {
            out.push('h');
            out.push_str(&n.to_string());
        }
    }
    out
}

/// Canonical form of a topology: hydrogen-grouped or bare.
pub fn canonicalize(topology: &Topology, include_hydrogens: bool) -> String {
    if include_hydrogens {
        stoichiometry(topology)
    } else {
        formula(topology)
    }
}

// ---------------------------------------------------------------------------
// Comparison against the stored canonical string
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalResult {
    Match,
    Mismatch,
    Missing,
}

impl fmt::Display for CanonicalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::Mismatch => write!(f, "mismatch"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// Outcome of recomputing a topology's canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalCheck {
    pub result: CanonicalResult,
    pub with_hydrogens: String,
    pub without_hydrogens: String,
}

/// Compare the stored canonical string against the recomputed bare form.
pub fn compare_canonical(topology: &Topology) -> CanonicalCheck {
    let with_hydrogens = canonicalize(topology, true);
    let without_hydrogens = canonicalize(topology, false);
    let result = match &topology.canonical {
        None => CanonicalResult::Missing,
        Some(stored) if *stored == without_hydrogens => CanonicalResult::Match,
        Some(_) => CanonicalResult::Mismatch,
    };
    CanonicalCheck {
        result,
        with_hydrogens,
        without_hydrogens,
    }
}

/// Audit row for a stored canonical string that did not match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalMismatch {
    pub id: ConformerId,
    pub result: CanonicalResult,
    pub given: String,
    pub with_hydrogens: String,
    pub without_hydrogens: String,
}

/// Per-record update step after merging: assigns the fate and audits the
/// canonical string of the record's topology, rewriting it to the recomputed
/// form on disagreement. Records without exactly one topology (marker-only
/// groups) skip the canonical audit.
pub fn update_record(record: &mut Conformer) -> Option<CanonicalMismatch> {
    record.fate = Some(classify(record));

    if record.topologies.len() != 1 {
        return None;
    }
    let check = compare_canonical(&record.topologies[0]);
    if check.result == CanonicalResult::Match {
        return None;
    }

    let given = record.topologies[0].canonical.clone().unwrap_or_default();
    record.topologies[0].canonical = Some(check.without_hydrogens.clone());
    Some(CanonicalMismatch {
        id: record.id,
        result: check.result,
        given,
        with_hydrogens: check.with_hydrogens,
        without_hydrogens: check.without_hydrogens,
    })
}
