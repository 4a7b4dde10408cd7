use crate::mol::Molecule;
use std::collections::HashSet;

/// Largest ring (in atoms) tracked for ring membership and aromaticity.
pub const MAX_RING_SIZE: usize = 8;

/// Enumerate simple cycles of up to [`MAX_RING_SIZE`] atoms.
///
/// Each ring is returned once, as its atoms in traversal order starting from
/// the lowest index. Rings are sorted by size, then by atom indices.
pub fn find_rings(mol: &Molecule) -> Vec<Vec<usize>> {
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut rings = Vec::new();

    for start in 0..mol.atom_count() {
        let mut path = vec![start];
        let mut on_path = vec![false; mol.atom_count()];
        on_path[start] = true;
        extend_path(mol, start, &mut path, &mut on_path, &mut seen, &mut rings);
    }

    rings.sort_by(|a: &Vec<usize>, b: &Vec<usize>| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    rings
}

fn extend_path(
    mol: &Molecule,
    start: usize,
    path: &mut Vec<usize>,
    on_path: &mut [bool],
    seen: &mut HashSet<Vec<usize>>,
    rings: &mut Vec<Vec<usize>>,
) {
    let Some(&last) = path.last() else {
        return;
    };
    let neighbors: Vec<usize> = mol.neighbors(last).map(|(idx, _)| idx).collect();
    for next in neighbors {
        if next == start && path.len() >= 3 {
            let mut key = path.clone();
            key.sort_unstable();
            if seen.insert(key) {
                rings.push(path.clone());
            }
            continue;
        }
        // Only walk through atoms above the start so each cycle is rooted at its minimum.
        if next <= start || on_path[next] || path.len() >= MAX_RING_SIZE {
            continue;
        }
        path.push(next);
        on_path[next] = true;
        extend_path(mol, start, path, on_path, seen, rings);
        on_path[next] = false;
        path.pop();
    }
}

/// Whether `from`–`to` is one of the consecutive pairs of `ring`.
pub fn ring_contains_bond(ring: &[usize], from: usize, to: usize) -> bool {
    let len = ring.len();
    (0..len).any(|i| {
        let a = ring[i];
        let b = ring[(i + 1) % len];
        (a == from && b == to) || (a == to && b == from)
    })
}
