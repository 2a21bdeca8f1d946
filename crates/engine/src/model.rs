use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Conformer id. Encodes its parent topology: `id / 1000` is the topology id,
/// `id % 1000` the conformer index within that topology.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConformerId(pub u64);

impl ConformerId {
    pub fn topology_id(self) -> TopologyId {
        TopologyId(self.0 / 1000)
    }

    pub fn topology_index(self) -> u64 {
        self.0 % 1000
    }
}

impl fmt::Display for ConformerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structural topology id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TopologyId(pub u64);

impl fmt::Display for TopologyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Structural topology
// ---------------------------------------------------------------------------

/// Atom vocabulary of the dataset. Charged variants carry their own tag so a
/// topology round-trips exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    C,
    N,
    #[serde(rename = "N+")]
    NPlus,
    O,
    #[serde(rename = "O-")]
    OMinus,
    F,
    H,
}

impl Element {
    pub fn symbol(self) -> &'static str {
        match self {
            Element::C => "C",
            Element::N => "N",
            Element::NPlus => "N+",
            Element::O => "O",
            Element::OMinus => "O-",
            Element::F => "F",
            Element::H => "H",
        }
    }

    pub fn is_hydrogen(self) -> bool {
        matches!(self, Element::H)
    }

    /// Charge-folded lowercase symbol used by the canonical forms.
    pub fn folded(self) -> char {
        match self {
            Element::C => 'c',
            Element::N | Element::NPlus => 'n',
            Element::O | Element::OMinus => 'o',
            Element::F => 'f',
            Element::H => 'h',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondOrder {
    Single,
    Double,
    Triple,
}

impl BondOrder {
    pub fn as_u8(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }
}

/// Bond between two atom indices (indices into `Topology::atoms`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

/// Bonding/connectivity descriptor shared by one or more conformers.
///
/// Heavy atoms come first, explicit hydrogens after, in source order.
/// `canonical` is the canonical structure string as given by the source; the
/// recomputed form may disagree (see `canonical::compare_canonical`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub id: TopologyId,
    pub atoms: Vec<Element>,
    pub bonds: Vec<Bond>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
}

impl Topology {
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| !a.is_hydrogen()).count()
    }

    /// Number of hydrogens bonded to the atom at `index`.
    pub fn hydrogen_count(&self, index: usize) -> usize {
        self.bonds
            .iter()
            .filter(|bond| {
                (bond.a == index && self.atoms[bond.b].is_hydrogen())
                    || (bond.b == index && self.atoms[bond.a].is_hydrogen())
            })
            .count()
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// One 3D coordinate set, one position per atom of the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub positions: Vec<[f64; 3]>,
}

// ---------------------------------------------------------------------------
// Properties + visibility tiers
// ---------------------------------------------------------------------------

/// Visibility tier of a computed property. Controls which output views a
/// property appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Standard,
    Complete,
    InternalOnly,
}

/// Computed scalar properties keyed by registry field name. Absent key means
/// the property was never computed.
pub type Properties = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Fixed-shape status codes reported by the computation stages.
///
/// The clean sentinel differs per field and is preserved exactly from the
/// legacy dataset:
/// - the four stage-1 codes (`opt_status`, `coord_check`,
///   `connectivity_check`, `frequency_check`) are clean at 1,
/// - `opt_status` value 3 is ALSO clean (legacy quirk, not a bug),
/// - the stage-2 codes are clean at 0,
/// - `normal_mode_rank` has inverted polarity: 0 means error, nonzero means
///   success (legacy quirk, not a bug).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorCodes {
    pub opt_status: i32,
    pub coord_check: i32,
    pub connectivity_check: i32,
    pub frequency_check: i32,
    pub atomic_analysis: i32,
    pub rotational_modes: i32,
    pub excitation_check: i32,
    pub normal_mode_rank: i32,
}

impl Default for ErrorCodes {
    fn default() -> Self {
        Self {
            opt_status: 1,
            coord_check: 1,
            connectivity_check: 1,
            frequency_check: 1,
            atomic_analysis: 0,
            rotational_modes: 0,
            excitation_check: 0,
            normal_mode_rank: 1,
        }
    }
}

impl ErrorCodes {
    /// True when any status code signals a fault.
    ///
    /// `opt_status` accepts 1 and 3 as clean; `normal_mode_rank` is the
    /// inverted-polarity field (0 is the fault value).
    pub fn has_calculation_errors(&self) -> bool {
        if self.opt_status != 1 && self.opt_status != 3 {
            return true;
        }
        if self.coord_check != 1 || self.connectivity_check != 1 || self.frequency_check != 1 {
            return true;
        }
        if self.atomic_analysis != 0 || self.rotational_modes != 0 || self.excitation_check != 0 {
            return true;
        }
        self.normal_mode_rank == 0
    }

    /// Field names and values in declared order, for stat extraction.
    pub fn fields(&self) -> [(&'static str, i32); 8] {
        [
            ("opt_status", self.opt_status),
            ("coord_check", self.coord_check),
            ("connectivity_check", self.connectivity_check),
            ("frequency_check", self.frequency_check),
            ("atomic_analysis", self.atomic_analysis),
            ("rotational_modes", self.rotational_modes),
            ("excitation_check", self.excitation_check),
            ("normal_mode_rank", self.normal_mode_rank),
        ]
    }
}

// ---------------------------------------------------------------------------
// Fate
// ---------------------------------------------------------------------------

/// Terminal classification of a conformer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fate {
    DuplicateSameTopology,
    DuplicateDifferentTopology,
    NoCalculationResults,
    GeometryOptimizationProblem,
    Disassociated,
    ForceConstantFailure,
    DiscardedOther,
    CalculationWithError,
    Success,
}

impl Fate {
    pub fn as_str(self) -> &'static str {
        match self {
            Fate::DuplicateSameTopology => "duplicate_same_topology",
            Fate::DuplicateDifferentTopology => "duplicate_different_topology",
            Fate::NoCalculationResults => "no_calculation_results",
            Fate::GeometryOptimizationProblem => "geometry_optimization_problem",
            Fate::Disassociated => "disassociated",
            Fate::ForceConstantFailure => "force_constant_failure",
            Fate::DiscardedOther => "discarded_other",
            Fate::CalculationWithError => "calculation_with_error",
            Fate::Success => "success",
        }
    }

    /// True for the four geometry-optimization failure classes.
    pub fn is_geometry_failure(self) -> bool {
        matches!(
            self,
            Fate::GeometryOptimizationProblem
                | Fate::Disassociated
                | Fate::ForceConstantFailure
                | Fate::DiscardedOther
        )
    }
}

impl fmt::Display for Fate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Canonical record
// ---------------------------------------------------------------------------

/// The canonical conformer record.
///
/// A non-duplicate record holds exactly one topology after a successful
/// merge; structural re-derivation may attach additional matched topologies
/// later. Records are value types: every pipeline stage receives and returns
/// its own owned copy, nothing is aliased across stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformer {
    pub id: ConformerId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topologies: Vec<Topology>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial_geometries: Vec<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default)]
    pub errors: ErrorCodes,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub duplicate_of: BTreeSet<ConformerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicated_by: Option<ConformerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fate: Option<Fate>,
}

impl Conformer {
    pub fn new(id: ConformerId) -> Self {
        Self {
            id,
            topologies: Vec::new(),
            initial_geometries: Vec::new(),
            optimized_geometry: None,
            properties: Properties::new(),
            errors: ErrorCodes::default(),
            duplicate_of: BTreeSet::new(),
            duplicated_by: None,
            fate: None,
        }
    }

    pub fn topology_id(&self) -> TopologyId {
        self.id.topology_id()
    }

    /// The record's primary topology, when one is attached.
    pub fn primary_topology(&self) -> Option<&Topology> {
        self.topologies.first()
    }

    pub fn has_initial_geometry(&self) -> bool {
        !self.initial_geometries.is_empty()
    }

    pub fn has_optimized_geometry(&self) -> bool {
        self.optimized_geometry.is_some()
    }
}

// ---------------------------------------------------------------------------
// Partial records
// ---------------------------------------------------------------------------

/// Which source produced a partial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Stage1,
    Stage2,
    Duplicate,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Stage1 => write!(f, "stage1"),
            Origin::Stage2 => write!(f, "stage2"),
            Origin::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// A partial record entering the merge, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub origin: Origin,
    pub record: Conformer,
}

impl PartialRecord {
    /// Degenerate duplicate-marker record: carries only the discarded id and
    /// the id it was folded into.
    pub fn duplicate_marker(discarded: ConformerId, kept: ConformerId) -> Self {
        let mut record = Conformer::new(discarded);
        record.duplicated_by = Some(kept);
        Self {
            origin: Origin::Duplicate,
            record,
        }
    }
}

// ---------------------------------------------------------------------------
// Topology summaries
// ---------------------------------------------------------------------------

/// Named counters of a per-topology summary, in the declared output order.
///
/// Combination is field-wise addition; the all-zero value is the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryCounts {
    pub attempted: u64,
    pub kept_geometry: u64,
    pub duplicates_same_topology: u64,
    pub duplicates_different_topology: u64,
    pub failed_geometry_optimization: u64,
    pub missing_calculation: u64,
    pub calculation_with_error: u64,
    pub calculation_success: u64,
    pub detected_match_with_error: u64,
    pub detected_match_success: u64,
}

impl SummaryCounts {
    /// Counter names in the declared CSV column order.
    pub const FIELD_NAMES: [&'static str; 10] = [
        "attempted",
        "kept_geometry",
        "duplicates_same_topology",
        "duplicates_different_topology",
        "failed_geometry_optimization",
        "missing_calculation",
        "calculation_with_error",
        "calculation_success",
        "detected_match_with_error",
        "detected_match_success",
    ];

    pub fn add(&mut self, other: &SummaryCounts) {
        self.attempted += other.attempted;
        self.kept_geometry += other.kept_geometry;
        self.duplicates_same_topology += other.duplicates_same_topology;
        self.duplicates_different_topology += other.duplicates_different_topology;
        self.failed_geometry_optimization += other.failed_geometry_optimization;
        self.missing_calculation += other.missing_calculation;
        self.calculation_with_error += other.calculation_with_error;
        self.calculation_success += other.calculation_success;
        self.detected_match_with_error += other.detected_match_with_error;
        self.detected_match_success += other.detected_match_success;
    }

    /// Counter values in `FIELD_NAMES` order.
    pub fn values(&self) -> [u64; 10] {
        [
            self.attempted,
            self.kept_geometry,
            self.duplicates_same_topology,
            self.duplicates_different_topology,
            self.failed_geometry_optimization,
            self.missing_calculation,
            self.calculation_with_error,
            self.calculation_success,
            self.detected_match_with_error,
            self.detected_match_success,
        ]
    }
}

/// Per-topology summary row: the topology descriptor plus its counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySummary {
    pub topology: Topology,
    pub counts: SummaryCounts,
}

impl TopologySummary {
    /// Zero-valued row for a topology never observed on any conformer.
    pub fn bare(topology: Topology) -> Self {
        Self {
            topology,
            counts: SummaryCounts::default(),
        }
    }

    pub fn topology_id(&self) -> TopologyId {
        self.topology.id
    }

    /// Field-wise combination. Commutative and associative; combining with a
    /// bare row is a no-op on the counters.
    pub fn combine(&mut self, other: &TopologySummary) {
        debug_assert_eq!(self.topology.id, other.topology.id);
        self.counts.add(&other.counts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_arithmetic() {
        let id = ConformerId(618451001);
        assert_eq!(id.topology_id(), TopologyId(618451));
        assert_eq!(id.topology_index(), 1);
    }

    #[test]
    fn default_error_codes_are_clean() {
        assert!(!ErrorCodes::default().has_calculation_errors());
    }

    #[test]
    fn opt_status_three_is_clean() {
        // Legacy quirk: 3 is success even though 1 is the documented sentinel.
        let codes = ErrorCodes {
            opt_status: 3,
            ..ErrorCodes::default()
        };
        assert!(!codes.has_calculation_errors());
    }

    #[test]
    fn inverted_polarity_field() {
        // normal_mode_rank is clean when nonzero, faulted at exactly 0.
        let codes = ErrorCodes {
            normal_mode_rank: 0,
            ..ErrorCodes::default()
        };
        assert!(codes.has_calculation_errors());

        let codes = ErrorCodes {
            normal_mode_rank: 7,
            ..ErrorCodes::default()
        };
        assert!(!codes.has_calculation_errors());
    }

    #[test]
    fn stage2_codes_fault_on_nonzero() {
        let codes = ErrorCodes {
            atomic_analysis: 999,
            ..ErrorCodes::default()
        };
        assert!(codes.has_calculation_errors());
    }

    #[test]
    fn summary_counts_identity() {
        let mut counts = SummaryCounts {
            attempted: 3,
            calculation_success: 2,
            ..SummaryCounts::default()
        };
        counts.add(&SummaryCounts::default());
        assert_eq!(counts.attempted, 3);
        assert_eq!(counts.calculation_success, 2);
    }

    #[test]
    fn hydrogen_counting() {
        // Methane: C with four explicit hydrogens.
        let topology = Topology {
            id: TopologyId(1),
            atoms: vec![Element::C, Element::H, Element::H, Element::H, Element::H],
            bonds: (1..5)
                .map(|b| Bond {
                    a: 0,
                    b,
                    order: BondOrder::Single,
                })
                .collect(),
            canonical: None,
        };
        assert_eq!(topology.heavy_atom_count(), 1);
        assert_eq!(topology.hydrogen_count(0), 4);
    }
}
