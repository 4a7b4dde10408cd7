use crate::element;
use crate::mol::{BondOrder, Molecule};

/// Mark aromatic rings (five to seven atoms) using a Hückel electron count.
///
/// Rings already written with aromatic bonds are accepted as given. Fused
/// systems are resolved by repeating the pass until nothing changes, since
/// marking one ring can turn a shared bond aromatic for its neighbour.
pub fn perceive(mol: &mut Molecule) {
    let candidates: Vec<Vec<usize>> = mol
        .rings()
        .iter()
        .filter(|ring| (5..=7).contains(&ring.len()))
        .cloned()
        .collect();
    let mut aromatic = vec![false; candidates.len()];

    for (idx, ring) in candidates.iter().enumerate() {
        if ring_bonds(ring).all(|(a, b)| mol.bond_between(a, b) == Some(BondOrder::Aromatic)) {
            mark_ring(mol, ring);
            aromatic[idx] = true;
        }
    }

    loop {
        let mut changed = false;
        for (idx, ring) in candidates.iter().enumerate() {
            if aromatic[idx] {
                continue;
            }
            let Some(electrons) = pi_electrons(mol, ring) else {
                continue;
            };
            if electrons >= 2 && (electrons - 2) % 4 == 0 {
                mark_ring(mol, ring);
                aromatic[idx] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn ring_bonds(ring: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    (0..ring.len()).map(move |i| (ring[i], ring[(i + 1) % ring.len()]))
}

fn mark_ring(mol: &mut Molecule, ring: &[usize]) {
    for &idx in ring {
        mol.atom_mut(idx).aromatic = true;
    }
    let bonds: Vec<(usize, usize)> = ring_bonds(ring).collect();
    for (a, b) in bonds {
        mol.set_bond_order(a, b, BondOrder::Aromatic);
    }
}

/// π electrons contributed by the ring atoms, or `None` when an atom cannot
/// take part in a conjugated ring (sp3 centres, cations without a π bond).
fn pi_electrons(mol: &Molecule, ring: &[usize]) -> Option<u32> {
    let len = ring.len();
    let mut total = 0;
    for i in 0..len {
        let idx = ring[i];
        let prev = ring[(i + len - 1) % len];
        let next = ring[(i + 1) % len];
        let in_ring_pi = [prev, next].iter().any(|&other| {
            matches!(
                mol.bond_between(idx, other),
                Some(BondOrder::Double | BondOrder::Aromatic)
            )
        });
        if in_ring_pi {
            total += 1;
            continue;
        }

        let exocyclic_double = mol
            .neighbors(idx)
            .any(|(other, order)| other != prev && other != next && order == BondOrder::Double);
        if exocyclic_double {
            continue;
        }

        let atom = mol.atom(idx);
        total += match (atom.atomic_number, atom.charge) {
            (element::NITROGEN | element::PHOSPHORUS, 0) => 2,
            (element::OXYGEN | element::SULFUR | element::SELENIUM, 0) => 2,
            (element::CARBON, -1) => 2,
            (element::CARBON, 1) => 0,
            (5, 0) => 0,
            _ => return None,
        };
    }
    Some(total)
}
