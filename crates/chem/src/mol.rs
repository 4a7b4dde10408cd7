use crate::element;
use crate::error::{ChemError, Result};
use crate::stereo::{DoubleBondStereo, TetrahedralCenter};
use crate::{aromaticity, rings};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

/// Bond multiplicity as stored on molecule edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// MDL bond type code (`1`..=`4`).
    pub fn molfile_code(self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Aromatic => 4,
        }
    }

    pub fn from_molfile_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            4 => Some(Self::Aromatic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub atomic_number: u8,
    pub charge: i8,
    pub isotope: Option<u16>,
    /// Hydrogens attached explicitly (bracket counts or folded hydrogen atoms).
    pub explicit_hydrogens: u8,
    /// Hydrogens implied by the default valence, set by [`Molecule::normalize`].
    pub implicit_hydrogens: u8,
    /// Bracket atoms state their hydrogen count and never gain implicit ones.
    pub fixed_hydrogens: bool,
    pub aromatic: bool,
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(atomic_number: u8) -> Self {
        Self {
            atomic_number,
            charge: 0,
            isotope: None,
            explicit_hydrogens: 0,
            implicit_hydrogens: 0,
            fixed_hydrogens: false,
            aromatic: false,
            position: [0.0; 3],
        }
    }

    pub fn aromatic(atomic_number: u8) -> Self {
        Self {
            aromatic: true,
            ..Self::new(atomic_number)
        }
    }

    pub fn symbol(&self) -> &'static str {
        element::symbol(self.atomic_number)
    }
}

/// Molecular graph: atoms are nodes, bonds are undirected edges.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    pub name: String,
    graph: UnGraph<Atom, BondOrder>,
    rings: Vec<Vec<usize>>,
    ring_atoms: Vec<bool>,
    tetrahedral: Vec<TetrahedralCenter>,
    double_bonds: Vec<DoubleBondStereo>,
}

impl Molecule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.graph.add_node(atom).index()
    }

    pub fn add_bond(&mut self, from: usize, to: usize, order: BondOrder) -> Result<()> {
        let count = self.atom_count();
        if from == to || from >= count || to >= count {
            return Err(ChemError::InvalidBond { from, to });
        }
        let (a, b) = (NodeIndex::new(from), NodeIndex::new(to));
        if self.graph.find_edge(a, b).is_some() {
            return Err(ChemError::InvalidBond { from, to });
        }
        self.graph.add_edge(a, b, order);
        Ok(())
    }

    pub fn atom(&self, idx: usize) -> &Atom {
        &self.graph[NodeIndex::new(idx)]
    }

    pub fn atom_mut(&mut self, idx: usize) -> &mut Atom {
        &mut self.graph[NodeIndex::new(idx)]
    }

    pub fn atoms(&self) -> impl Iterator<Item = &Atom> + '_ {
        self.graph.raw_nodes().iter().map(|node| &node.weight)
    }

    /// All bonds as `(from, to, order)` in insertion order.
    pub fn bonds(&self) -> impl Iterator<Item = (usize, usize, BondOrder)> + '_ {
        self.graph
            .raw_edges()
            .iter()
            .map(|edge| (edge.source().index(), edge.target().index(), edge.weight))
    }

    pub fn bond_between(&self, from: usize, to: usize) -> Option<BondOrder> {
        self.graph
            .find_edge(NodeIndex::new(from), NodeIndex::new(to))
            .map(|edge| self.graph[edge])
    }

    pub fn set_bond_order(&mut self, from: usize, to: usize, order: BondOrder) {
        if let Some(edge) = self
            .graph
            .find_edge(NodeIndex::new(from), NodeIndex::new(to))
        {
            self.graph[edge] = order;
        }
    }

    /// Neighbours of `idx` with the connecting bond order.
    pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = (usize, BondOrder)> + '_ {
        let node = NodeIndex::new(idx);
        self.graph.edges(node).map(move |edge| {
            let other = if edge.source() == node {
                edge.target()
            } else {
                edge.source()
            };
            (other.index(), *edge.weight())
        })
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.graph.edges(NodeIndex::new(idx)).count()
    }

    pub fn net_charge(&self) -> i32 {
        self.atoms().map(|atom| i32::from(atom.charge)).sum()
    }

    /// Rings found by the last call to [`Molecule::normalize`].
    pub fn rings(&self) -> &[Vec<usize>] {
        &self.rings
    }

    pub fn is_ring_atom(&self, idx: usize) -> bool {
        self.ring_atoms.get(idx).copied().unwrap_or(false)
    }

    pub fn is_ring_bond(&self, from: usize, to: usize) -> bool {
        self.rings.iter().any(|ring| rings::ring_contains_bond(ring, from, to))
    }

    /// Size of the smallest perceived ring through `idx`.
    pub fn smallest_ring_size(&self, idx: usize) -> Option<usize> {
        self.rings
            .iter()
            .filter(|ring| ring.contains(&idx))
            .map(Vec::len)
            .min()
    }

    pub fn total_hydrogens(&self, idx: usize) -> u8 {
        let atom = self.atom(idx);
        atom.explicit_hydrogens.saturating_add(atom.implicit_hydrogens)
    }

    pub fn tetrahedral_centers(&self) -> &[TetrahedralCenter] {
        &self.tetrahedral
    }

    pub fn double_bond_stereo(&self) -> &[DoubleBondStereo] {
        &self.double_bonds
    }

    /// Record a stereocentre; a later entry for the same atom is ignored.
    pub fn add_tetrahedral(&mut self, center: TetrahedralCenter) {
        if !self.tetrahedral.iter().any(|known| known.center == center.center) {
            self.tetrahedral.push(center);
        }
    }

    pub fn add_double_bond_stereo(&mut self, bond: DoubleBondStereo) {
        let same = |known: &DoubleBondStereo| {
            (known.from == bond.from && known.to == bond.to)
                || (known.from == bond.to && known.to == bond.from)
        };
        if !self.double_bonds.iter().any(same) {
            self.double_bonds.push(bond);
        }
    }

    /// Fold explicit hydrogens, perceive rings and aromaticity.
    ///
    /// Every parser calls this before handing a molecule out, so Kekulé and
    /// aromatic spellings of the same compound end up with identical graphs.
    pub fn normalize(&mut self) {
        self.fold_hydrogens();
        self.assign_implicit_hydrogens();
        self.perceive_rings();
        aromaticity::perceive(self);
        self.demote_acyclic_aromatic_bonds();
    }

    pub(crate) fn perceive_rings(&mut self) {
        self.rings = rings::find_rings(self);
        let mut ring_atoms = vec![false; self.atom_count()];
        for ring in &self.rings {
            for &idx in ring {
                ring_atoms[idx] = true;
            }
        }
        self.ring_atoms = ring_atoms;
    }

    fn fold_hydrogens(&mut self) {
        let mut folded = Vec::new();
        for idx in 0..self.atom_count() {
            let atom = self.atom(idx);
            if atom.atomic_number != element::HYDROGEN
                || atom.isotope.is_some()
                || atom.charge != 0
                || self.degree(idx) != 1
            {
                continue;
            }
            if let Some((heavy, BondOrder::Single)) = self.neighbors(idx).next() {
                if self.atom(heavy).atomic_number != element::HYDROGEN {
                    folded.push((idx, heavy));
                }
            }
        }
        if folded.is_empty() {
            return;
        }

        let mut keep = vec![true; self.atom_count()];
        for &(hydrogen, heavy) in &folded {
            keep[hydrogen] = false;
            let atom = self.atom_mut(heavy);
            atom.explicit_hydrogens = atom.explicit_hydrogens.saturating_add(1);
        }

        let mut remap = vec![usize::MAX; self.atom_count()];
        let mut graph = UnGraph::with_capacity(self.atom_count(), self.bond_count());
        for (idx, kept) in keep.iter().enumerate() {
            if *kept {
                remap[idx] = graph.add_node(self.atom(idx).clone()).index();
            }
        }
        for (from, to, order) in self.bonds() {
            if keep[from] && keep[to] {
                graph.add_edge(
                    NodeIndex::new(remap[from]),
                    NodeIndex::new(remap[to]),
                    order,
                );
            }
        }
        self.graph = graph;

        self.tetrahedral = self
            .tetrahedral
            .iter()
            .filter_map(|center| center.remap(&remap))
            .collect();
        let double_bonds: Vec<DoubleBondStereo> = self
            .double_bonds
            .iter()
            .filter_map(|bond| bond.remap(&remap, self))
            .collect();
        self.double_bonds = double_bonds;
    }

    /// Fill in hydrogens up to the lowest default valence that fits.
    ///
    /// Runs on the input bond orders, before aromaticity perception. Atoms
    /// written aromatic count one extra bond for their delocalised electron.
    fn assign_implicit_hydrogens(&mut self) {
        for idx in 0..self.atom_count() {
            let atom = self.atom(idx);
            if atom.fixed_hydrogens {
                continue;
            }
            let effective = i16::from(atom.atomic_number) - i16::from(atom.charge);
            let valences = u8::try_from(effective)
                .ok()
                .filter(|_| element::has_default_valence(atom.atomic_number))
                .map(element::default_valences)
                .unwrap_or(&[]);

            let mut aromatic_bonds = 0u32;
            let mut used = u32::from(atom.explicit_hydrogens);
            for (_, order) in self.neighbors(idx) {
                match order {
                    BondOrder::Aromatic => aromatic_bonds += 1,
                    other => used += u32::from(other.molfile_code()),
                }
            }
            let candidates = if aromatic_bonds > 0 {
                used += aromatic_bonds + 1;
                &valences[..valences.len().min(1)]
            } else {
                valences
            };
            let implicit = candidates
                .iter()
                .map(|&valence| u32::from(valence))
                .find(|&valence| valence >= used)
                .map_or(0, |valence| valence - used);
            self.atom_mut(idx).implicit_hydrogens = u8::try_from(implicit).unwrap_or(u8::MAX);
        }
    }

    fn demote_acyclic_aromatic_bonds(&mut self) {
        let acyclic: Vec<(usize, usize)> = self
            .bonds()
            .filter(|(from, to, order)| {
                *order == BondOrder::Aromatic && !self.is_ring_bond(*from, *to)
            })
            .map(|(from, to, _)| (from, to))
            .collect();
        for (from, to) in acyclic {
            self.set_bond_order(from, to, BondOrder::Single);
        }
    }
}
