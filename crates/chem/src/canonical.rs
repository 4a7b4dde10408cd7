use crate::mol::Molecule;
use crate::stereo::{DoubleBondStereo, TetrahedralCenter};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical identity of a structure, laid out like an InChIKey:
/// `SKELETONBLOCKX-FULLBLOC` + `SA-` + charge flag.
///
/// The skeleton block hashes connectivity alone; the second block also covers
/// bond orders, aromaticity, charges, isotopes and stereo. Hydrogens are
/// ignored so a molfile with explicit hydrogen atoms keys the same as one
/// without.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn of(mol: &Molecule) -> Self {
        let skeleton = digest(mol, false);
        let full = digest(mol, true);
        let flag = match mol.net_charge() {
            0 => 'N',
            charge if charge > 0 => 'O',
            _ => 'M',
        };
        Self(format!(
            "{}-{}SA-{flag}",
            letters(&skeleton, 14),
            letters(&full, 8)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Connectivity block shared by structures that differ only in bond orders or charges.
    pub fn skeleton(&self) -> &str {
        self.0.split('-').next().unwrap_or("")
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IdentityKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// SHA-256 over the canonical certificate of `mol`.
fn digest(mol: &Molecule, detailed: bool) -> [u8; 32] {
    let certificate = Labeller::new(mol, detailed).canonical_certificate();
    let mut hasher = Sha256::new();
    hasher.update((mol.atom_count() as u64).to_le_bytes());
    for value in certificate {
        hasher.update(value.to_le_bytes());
    }
    hasher.finalize().into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct AtomInvariant {
    atomic_number: u8,
    degree: usize,
    smallest_ring: usize,
    aromatic: bool,
    charge: i8,
    isotope: u16,
}

struct Leaf {
    certificate: Vec<u64>,
    order: Vec<usize>,
}

/// Canonical labelling by partition refinement with individualisation.
///
/// Refinement alone cannot separate atoms in regular graphs (decalin and
/// bicyclopentyl look alike to it), so whenever a class of equivalent atoms
/// survives refinement each member is individualised in turn and the
/// lexicographically smallest certificate over all discrete labellings wins.
/// Automorphisms found along the way prune branches that would repeat one.
struct Labeller<'a> {
    mol: &'a Molecule,
    invariants: Vec<u64>,
    adjacency: Vec<Vec<(usize, u8)>>,
    tetrahedral: Vec<TetrahedralCenter>,
    double_bonds: Vec<DoubleBondStereo>,
    first: Option<Leaf>,
    best: Option<Leaf>,
    automorphisms: Vec<Vec<usize>>,
}

impl<'a> Labeller<'a> {
    fn new(mol: &'a Molecule, detailed: bool) -> Self {
        let keys: Vec<AtomInvariant> = (0..mol.atom_count())
            .map(|idx| {
                let atom = mol.atom(idx);
                AtomInvariant {
                    atomic_number: atom.atomic_number,
                    degree: mol.degree(idx),
                    smallest_ring: mol.smallest_ring_size(idx).unwrap_or(0),
                    aromatic: detailed && atom.aromatic,
                    charge: if detailed { atom.charge } else { 0 },
                    isotope: if detailed { atom.isotope.unwrap_or(0) } else { 0 },
                }
            })
            .collect();
        let adjacency = (0..mol.atom_count())
            .map(|idx| {
                mol.neighbors(idx)
                    .map(|(other, order)| (other, if detailed { order.molfile_code() } else { 0 }))
                    .collect()
            })
            .collect();
        let (tetrahedral, double_bonds) = if detailed {
            (
                mol.tetrahedral_centers()
                    .iter()
                    .filter(|center| center.is_valid(mol))
                    .cloned()
                    .collect(),
                mol.double_bond_stereo()
                    .iter()
                    .filter(|bond| bond.is_valid(mol))
                    .cloned()
                    .collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };
        Self {
            mol,
            invariants: dense_ranks(&keys),
            adjacency,
            tetrahedral,
            double_bonds,
            first: None,
            best: None,
            automorphisms: Vec::new(),
        }
    }

    /// Smallest certificate, after dropping stereo elements whose inversion
    /// leaves the molecule unchanged (two equal substituents on a centre).
    fn canonical_certificate(mut self) -> Vec<u64> {
        loop {
            let certificate = self.search();
            let redundant = (0..self.tetrahedral.len() + self.double_bonds.len()).find(|&element| {
                self.invert(element);
                let inverted = self.search();
                self.invert(element);
                inverted == certificate
            });
            match redundant {
                Some(element) if element < self.tetrahedral.len() => {
                    self.tetrahedral.remove(element);
                }
                Some(element) => {
                    self.double_bonds.remove(element - self.tetrahedral.len());
                }
                None => return certificate,
            }
        }
    }

    fn invert(&mut self, element: usize) {
        match self.tetrahedral.get_mut(element) {
            Some(center) => center.clockwise = !center.clockwise,
            None => {
                let bond = &mut self.double_bonds[element - self.tetrahedral.len()];
                bond.trans = !bond.trans;
            }
        }
    }

    fn search(&mut self) -> Vec<u64> {
        self.first = None;
        self.best = None;
        self.automorphisms.clear();
        let colors = self.invariants.clone();
        self.descend(colors, &mut Vec::new());
        self.best
            .take()
            .map(|leaf| leaf.certificate)
            .unwrap_or_default()
    }

    fn descend(&mut self, colors: Vec<u64>, path: &mut Vec<usize>) {
        let colors = self.refine(colors);
        let cell = target_cell(&colors);
        if cell.is_empty() {
            self.visit_leaf(&colors);
            return;
        }
        let mut explored: Vec<usize> = Vec::new();
        for atom in cell {
            if self.same_orbit(&explored, atom, path) {
                continue;
            }
            explored.push(atom);
            path.push(atom);
            self.descend(individualize(&colors, atom), path);
            path.pop();
        }
    }

    /// Split classes by the multiset of neighbouring classes until stable.
    fn refine(&self, mut colors: Vec<u64>) -> Vec<u64> {
        let mut classes = class_count(&colors);
        loop {
            let signatures: Vec<(u64, Vec<(u8, u64)>)> = self
                .adjacency
                .iter()
                .enumerate()
                .map(|(idx, neighbors)| {
                    let mut around: Vec<(u8, u64)> = neighbors
                        .iter()
                        .map(|&(other, code)| (code, colors[other]))
                        .collect();
                    around.sort_unstable();
                    (colors[idx], around)
                })
                .collect();
            colors = dense_ranks(&signatures);
            let next = class_count(&colors);
            if next == classes {
                return colors;
            }
            classes = next;
        }
    }

    fn visit_leaf(&mut self, colors: &[u64]) {
        let mut order = vec![0; colors.len()];
        for (idx, &color) in colors.iter().enumerate() {
            order[color as usize] = idx;
        }
        let certificate = self.certificate(colors, &order);

        let mut found = Vec::new();
        if let Some(first) = &self.first {
            if first.certificate == certificate {
                found.push(automorphism(&first.order, &order));
            }
        } else {
            self.first = Some(Leaf {
                certificate: certificate.clone(),
                order: order.clone(),
            });
        }
        let replace = match &self.best {
            Some(best) if best.certificate == certificate => {
                found.push(automorphism(&best.order, &order));
                false
            }
            Some(best) => certificate < best.certificate,
            None => true,
        };
        if replace {
            self.best = Some(Leaf { certificate, order });
        }
        for gamma in found {
            let moves = gamma.iter().enumerate().any(|(idx, &image)| idx != image);
            if moves && !self.automorphisms.contains(&gamma) {
                self.automorphisms.push(gamma);
            }
        }
    }

    /// Atom invariants in label order, then each atom's bonds to higher
    /// labels, then stereo descriptors relative to the labels.
    fn certificate(&self, colors: &[u64], order: &[usize]) -> Vec<u64> {
        let mut certificate: Vec<u64> = order.iter().map(|&idx| self.invariants[idx]).collect();
        for (position, &idx) in order.iter().enumerate() {
            let mut bonds: Vec<(u64, u8)> = self.adjacency[idx]
                .iter()
                .map(|&(other, code)| (colors[other], code))
                .filter(|&(label, _)| label > position as u64)
                .collect();
            bonds.sort_unstable();
            certificate.push(bonds.len() as u64);
            for (label, code) in bonds {
                certificate.push(label);
                certificate.push(u64::from(code));
            }
        }

        let mut stereo: Vec<[u64; 3]> = self
            .tetrahedral
            .iter()
            .map(|center| {
                [
                    colors[center.center],
                    u64::MAX,
                    u64::from(center.clockwise_by_rank(colors)),
                ]
            })
            .chain(self.double_bonds.iter().map(|bond| {
                let (a, b) = (colors[bond.from], colors[bond.to]);
                [
                    a.min(b),
                    a.max(b),
                    u64::from(bond.trans_by_rank(self.mol, colors)),
                ]
            }))
            .collect();
        stereo.sort_unstable();
        certificate.push(stereo.len() as u64);
        certificate.extend(stereo.into_iter().flatten());
        certificate
    }

    /// Whether `atom` is the image of an explored sibling under the known
    /// automorphisms that fix every atom on `path`.
    fn same_orbit(&self, explored: &[usize], atom: usize, path: &[usize]) -> bool {
        if explored.is_empty() {
            return false;
        }
        let mut parent: Vec<usize> = (0..self.invariants.len()).collect();
        for gamma in self
            .automorphisms
            .iter()
            .filter(|gamma| path.iter().all(|&fixed| gamma[fixed] == fixed))
        {
            for (idx, &image) in gamma.iter().enumerate() {
                let (a, b) = (find(&mut parent, idx), find(&mut parent, image));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
        let root = find(&mut parent, atom);
        explored.iter().any(|&other| find(&mut parent, other) == root)
    }
}

/// Smallest class with more than one member, lowest colour first.
fn target_cell(colors: &[u64]) -> Vec<usize> {
    let mut sizes: BTreeMap<u64, usize> = BTreeMap::new();
    for &color in colors {
        *sizes.entry(color).or_default() += 1;
    }
    let Some((&color, _)) = sizes
        .iter()
        .filter(|entry| *entry.1 > 1)
        .min_by_key(|entry| (*entry.1, *entry.0))
    else {
        return Vec::new();
    };
    (0..colors.len()).filter(|&idx| colors[idx] == color).collect()
}

/// Give `atom` a class of its own, ahead of the rest of its old class.
fn individualize(colors: &[u64], atom: usize) -> Vec<u64> {
    let cell = colors[atom];
    colors
        .iter()
        .enumerate()
        .map(|(idx, &color)| {
            if color > cell || (color == cell && idx != atom) {
                color + 1
            } else {
                color
            }
        })
        .collect()
}

/// Map each atom of one labelling onto the atom holding its label in the other.
fn automorphism(from: &[usize], to: &[usize]) -> Vec<usize> {
    let mut gamma = vec![0; from.len()];
    for (&a, &b) in from.iter().zip(to) {
        gamma[a] = b;
    }
    gamma
}

fn find(parent: &mut [usize], mut idx: usize) -> usize {
    while parent[idx] != idx {
        parent[idx] = parent[parent[idx]];
        idx = parent[idx];
    }
    idx
}

fn dense_ranks<T: Ord + Clone>(keys: &[T]) -> Vec<u64> {
    let mut sorted = keys.to_vec();
    sorted.sort();
    sorted.dedup();
    keys.iter()
        .map(|key| {
            let (Ok(rank) | Err(rank)) = sorted.binary_search(key);
            rank as u64
        })
        .collect()
}

fn class_count(colors: &[u64]) -> usize {
    colors.iter().max().map_or(0, |&max| max as usize + 1)
}

fn letters(bytes: &[u8], len: usize) -> String {
    bytes
        .iter()
        .take(len)
        .map(|byte| char::from(b'A' + byte % 26))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molfile::parse_molfile;
    use crate::smiles::parse_smiles;
    use pretty_assertions::assert_eq;

    fn key(smiles: &str) -> IdentityKey {
        IdentityKey::of(&parse_smiles(smiles).expect("valid smiles"))
    }

    #[test]
    fn key_has_inchikey_layout() {
        let key = key("CCO");
        let text = key.as_str();
        assert_eq!(text.len(), 27);
        assert_eq!(&text[14..15], "-");
        assert!(text.ends_with("SA-N"));
        assert!(text[..14].chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn key_is_independent_of_atom_order() {
        assert_eq!(key("CCO"), key("OCC"));
        assert_eq!(key("c1ccccc1O"), key("Oc1ccccc1"));
        assert_eq!(key("C1=CC=CC=C1C(=O)O"), key("OC(=O)c1ccccc1"));
    }

    #[test]
    fn key_distinguishes_isomers_and_charges() {
        assert_ne!(key("CCO"), key("COC"));
        assert_ne!(key("CC(C)O"), key("CCCO"));
        assert!(key("C[NH3+]").as_str().ends_with("-O"));
        assert!(key("CC(=O)[O-]").as_str().ends_with("-M"));
    }

    #[test]
    fn ring_systems_with_matching_degrees_get_distinct_keys() {
        let decalin = key("C1CCC2CCCCC2C1");
        let bicyclopentyl = key("C1CCC(C1)C1CCCC1");
        assert_ne!(decalin, bicyclopentyl);
        assert_ne!(decalin.skeleton(), bicyclopentyl.skeleton());

        assert_ne!(key("C1CCCCC1"), key("C1CC1.C1CC1"));
        assert_ne!(key("C1CCCCCC1"), key("C1CC1.C1CCC1"));
    }

    #[test]
    fn symmetric_molecules_key_the_same_from_any_spelling() {
        assert_eq!(key("c1ccc2ccccc2c1"), key("c1cc2ccccc2cc1"));
        assert_eq!(
            key("CC(C)(C)c1ccc(cc1)C(C)(C)C"),
            key("c1cc(ccc1C(C)(C)C)C(C)(C)C")
        );
        assert_eq!(key("C1CC1.C1CC1"), key("C1CC1.C1CC1"));
    }

    #[test]
    fn enantiomers_differ_only_in_the_second_block() {
        let l_alanine = key("C[C@H](N)C(=O)O");
        let d_alanine = key("C[C@@H](N)C(=O)O");
        assert_ne!(l_alanine, d_alanine);
        assert_eq!(l_alanine.skeleton(), d_alanine.skeleton());
        assert_ne!(l_alanine, key("CC(N)C(=O)O"));
        // Swapping two neighbours and the winding describes the same centre.
        assert_eq!(l_alanine, key("N[C@@H](C)C(=O)O"));
    }

    #[test]
    fn double_bond_geometry_is_part_of_the_key() {
        let trans = key("Cl/C=C/Cl");
        let cis = key("Cl/C=C\\Cl");
        assert_ne!(trans, cis);
        assert_eq!(trans.skeleton(), cis.skeleton());
        assert_ne!(trans, key("ClC=CCl"));
        assert_eq!(trans, key("Cl\\C=C\\Cl"));
        assert_eq!(trans, key("C(\\Cl)=C/Cl"));
    }

    #[test]
    fn stereo_marks_on_symmetric_centres_are_ignored() {
        assert_eq!(key("C[C@H](C)O"), key("CC(C)O"));
        assert_eq!(key("C/C(C)=C/C"), key("CC(C)=CC"));
    }

    #[test]
    fn bond_order_changes_keep_the_skeleton() {
        let ethane = key("CC");
        let ethene = key("C=C");
        assert_ne!(ethane, ethene);
        assert_eq!(ethane.skeleton(), ethene.skeleton());
    }

    #[test]
    fn explicit_hydrogen_atoms_do_not_change_the_key() {
        let text = "methane

  5  4  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.0000    0.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
   -1.0000    0.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000    1.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000   -1.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  1  3  1  0
  1  4  1  0
  1  5  1  0
M  END
";
        let with_h = IdentityKey::of(&parse_molfile(text).expect("valid molfile"));
        assert_eq!(with_h, key("C"));
    }
}
