//! Tetrahedral and double-bond stereo descriptors.
//!
//! Descriptors are stored relative to the neighbour order the input used and
//! are re-expressed relative to canonical ranks when keys are computed.

use crate::mol::{BondOrder, Molecule};
use crate::rings::MAX_RING_SIZE;

/// Handedness of a tetrahedral centre.
///
/// Looking from the first neighbour, the remaining ones wind clockwise
/// (`@@` in SMILES) or anticlockwise (`@`). `None` stands for an implicit
/// hydrogen or lone pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TetrahedralCenter {
    pub center: usize,
    pub neighbors: Vec<Option<usize>>,
    pub clockwise: bool,
}

impl TetrahedralCenter {
    pub(crate) fn is_valid(&self, mol: &Molecule) -> bool {
        let implicit = self.neighbors.iter().filter(|n| n.is_none()).count();
        let explicit: Vec<usize> = self.neighbors.iter().flatten().copied().collect();
        (3..=4).contains(&self.neighbors.len())
            && implicit <= 1
            && mol.total_hydrogens(self.center) <= 1
            && explicit.len() == mol.degree(self.center)
            && explicit
                .iter()
                .all(|&other| mol.bond_between(self.center, other).is_some())
    }

    /// Handedness with the neighbours taken in ascending `rank` (implicit neighbour first).
    pub(crate) fn clockwise_by_rank(&self, rank: &[u64]) -> bool {
        let keys: Vec<u64> = self
            .neighbors
            .iter()
            .map(|neighbor| neighbor.map_or(0, |idx| rank[idx] + 1))
            .collect();
        let mut inversions = 0;
        for i in 0..keys.len() {
            for j in i + 1..keys.len() {
                if keys[i] > keys[j] {
                    inversions += 1;
                }
            }
        }
        self.clockwise ^ (inversions % 2 == 1)
    }

    pub(crate) fn remap(&self, remap: &[usize]) -> Option<Self> {
        let center = mapped(remap, self.center)?;
        let neighbors: Vec<Option<usize>> = self
            .neighbors
            .iter()
            .map(|neighbor| neighbor.and_then(|idx| mapped(remap, idx)))
            .collect();
        if neighbors.iter().filter(|n| n.is_none()).count() > 1 {
            return None;
        }
        Some(Self {
            center,
            neighbors,
            clockwise: self.clockwise,
        })
    }
}

/// Geometry of a double bond given by one reference neighbour at each end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleBondStereo {
    pub from: usize,
    pub to: usize,
    pub from_ref: usize,
    pub to_ref: usize,
    /// References sit on opposite sides of the bond.
    pub trans: bool,
}

impl DoubleBondStereo {
    /// Double bonds inside rings below [`MAX_RING_SIZE`] atoms carry no geometry.
    pub(crate) fn is_valid(&self, mol: &Molecule) -> bool {
        let end_ok = |end: usize, other: usize, reference: usize| {
            let others = mol.degree(end) - 1;
            (1..=2).contains(&others)
                && reference != other
                && mol.bond_between(end, reference).is_some()
        };
        mol.bond_between(self.from, self.to) == Some(BondOrder::Double)
            && end_ok(self.from, self.to, self.from_ref)
            && end_ok(self.to, self.from, self.to_ref)
            && !mol
                .rings()
                .iter()
                .filter(|ring| ring.len() < MAX_RING_SIZE)
                .any(|ring| crate::rings::ring_contains_bond(ring, self.from, self.to))
    }

    /// Geometry measured from the lowest-ranked neighbour at each end.
    pub(crate) fn trans_by_rank(&self, mol: &Molecule, rank: &[u64]) -> bool {
        let lowest = |end: usize, other: usize| {
            mol.neighbors(end)
                .map(|(idx, _)| idx)
                .filter(|&idx| idx != other)
                .min_by_key(|&idx| rank[idx])
        };
        let from_flip = lowest(self.from, self.to) != Some(self.from_ref);
        let to_flip = lowest(self.to, self.from) != Some(self.to_ref);
        self.trans ^ from_flip ^ to_flip
    }

    /// Follow an atom renumbering; a dropped reference is replaced by the
    /// other substituent on that end, which sits on the opposite side.
    pub(crate) fn remap(&self, remap: &[usize], mol: &Molecule) -> Option<Self> {
        let from = mapped(remap, self.from)?;
        let to = mapped(remap, self.to)?;
        let substitute = |end: usize, other: usize| {
            mol.neighbors(end)
                .map(|(idx, _)| idx)
                .find(|&idx| idx != other)
        };
        let (from_ref, from_flip) = match mapped(remap, self.from_ref) {
            Some(idx) => (idx, false),
            None => (substitute(from, to)?, true),
        };
        let (to_ref, to_flip) = match mapped(remap, self.to_ref) {
            Some(idx) => (idx, false),
            None => (substitute(to, from)?, true),
        };
        Some(Self {
            from,
            to,
            from_ref,
            to_ref,
            trans: self.trans ^ from_flip ^ to_flip,
        })
    }
}

fn mapped(remap: &[usize], idx: usize) -> Option<usize> {
    remap.get(idx).copied().filter(|&target| target != usize::MAX)
}

/// Stereo from 2D coordinates and wedge bonds, as drawn in a molfile.
///
/// `wedges` lists `(start, end, up)` for wedged (`up`) and hashed bonds;
/// only the start atom of a wedge is treated as a stereocentre. Bonds in
/// `unspecified` were drawn as "either" and get no geometry. Molecules whose
/// atoms all share one position (no layout) get no stereo.
pub(crate) fn perceive_from_coordinates(
    mol: &mut Molecule,
    wedges: &[(usize, usize, bool)],
    unspecified: &[(usize, usize)],
) {
    let Some(first) = mol.atoms().next().map(|atom| atom.position) else {
        return;
    };
    if mol
        .atoms()
        .all(|atom| (atom.position[0] - first[0]).abs() < 1e-4 && (atom.position[1] - first[1]).abs() < 1e-4)
    {
        return;
    }

    let mut centers: Vec<usize> = wedges.iter().map(|&(start, _, _)| start).collect();
    centers.sort_unstable();
    centers.dedup();
    for center in centers {
        if let Some(stereo) = wedge_center(mol, center, wedges) {
            mol.add_tetrahedral(stereo);
        }
    }

    let doubles: Vec<(usize, usize)> = mol
        .bonds()
        .filter(|&(from, to, order)| {
            order == BondOrder::Double
                && !unspecified
                    .iter()
                    .any(|&(a, b)| (a == from && b == to) || (a == to && b == from))
        })
        .map(|(from, to, _)| (from, to))
        .collect();
    for (from, to) in doubles {
        if let Some(stereo) = drawn_geometry(mol, from, to) {
            mol.add_double_bond_stereo(stereo);
        }
    }
}

fn wedge_center(
    mol: &Molecule,
    center: usize,
    wedges: &[(usize, usize, bool)],
) -> Option<TetrahedralCenter> {
    let origin = mol.atom(center).position;
    let mut neighbors: Vec<Option<usize>> = Vec::new();
    let mut vectors: Vec<[f64; 3]> = Vec::new();
    for (other, _) in mol.neighbors(center) {
        let position = mol.atom(other).position;
        let (dx, dy) = (position[0] - origin[0], position[1] - origin[1]);
        let length = (dx * dx + dy * dy).sqrt();
        let dz = wedges
            .iter()
            .find(|&&(start, end, _)| start == center && end == other)
            .map_or(0.0, |&(_, _, up)| if up { length } else { -length });
        neighbors.push(Some(other));
        vectors.push([dx, dy, dz]);
    }
    match vectors.len() {
        3 => {
            let implicit = [
                -(vectors[0][0] + vectors[1][0] + vectors[2][0]),
                -(vectors[0][1] + vectors[1][1] + vectors[2][1]),
                -(vectors[0][2] + vectors[1][2] + vectors[2][2]),
            ];
            neighbors.push(None);
            vectors.push(implicit);
        }
        4 => {}
        _ => return None,
    }

    let edge = |i: usize| {
        [
            vectors[i][0] - vectors[0][0],
            vectors[i][1] - vectors[0][1],
            vectors[i][2] - vectors[0][2],
        ]
    };
    let volume = determinant(edge(1), edge(2), edge(3));
    if volume.abs() < 1e-6 {
        return None;
    }
    Some(TetrahedralCenter {
        center,
        neighbors,
        clockwise: volume > 0.0,
    })
}

fn drawn_geometry(mol: &Molecule, from: usize, to: usize) -> Option<DoubleBondStereo> {
    let from_ref = mol.neighbors(from).map(|(idx, _)| idx).find(|&idx| idx != to)?;
    let to_ref = mol.neighbors(to).map(|(idx, _)| idx).find(|&idx| idx != from)?;
    let a = mol.atom(from).position;
    let b = mol.atom(to).position;
    let side = |point: [f64; 3]| {
        (b[0] - a[0]) * (point[1] - a[1]) - (b[1] - a[1]) * (point[0] - a[0])
    };
    let from_side = side(mol.atom(from_ref).position);
    let to_side = side(mol.atom(to_ref).position);
    if from_side.abs() < 1e-6 || to_side.abs() < 1e-6 {
        return None;
    }
    Some(DoubleBondStereo {
        from,
        to,
        from_ref,
        to_ref,
        trans: (from_side > 0.0) != (to_side > 0.0),
    })
}

fn determinant(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> f64 {
    a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
        + a[2] * (b[0] * c[1] - b[1] * c[0])
}
