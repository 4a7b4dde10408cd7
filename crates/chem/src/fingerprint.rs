use crate::mol::{Atom, Molecule};

/// Fingerprint width in bits.
pub const FINGERPRINT_BITS: usize = 2048;
/// Longest path (in bonds) hashed into a fingerprint.
pub const MAX_PATH_BONDS: usize = 7;

const WORDS: usize = FINGERPRINT_BITS / 64;

/// Hashed linear-path fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    words: [u64; WORDS],
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self { words: [0; WORDS] }
    }
}

impl Fingerprint {
    /// Hash every simple path of up to [`MAX_PATH_BONDS`] bonds, single atoms included.
    pub fn of(mol: &Molecule) -> Self {
        let mut fp = Self::default();
        let mut path = Vec::with_capacity(MAX_PATH_BONDS + 1);
        let mut on_path = vec![false; mol.atom_count()];
        for start in 0..mol.atom_count() {
            path.push(start);
            on_path[start] = true;
            fp.walk(mol, &mut path, &mut on_path);
            on_path[start] = false;
            path.pop();
        }
        fp
    }

    fn walk(&mut self, mol: &Molecule, path: &mut Vec<usize>, on_path: &mut [bool]) {
        self.set(path_hash(mol, path));
        if path.len() > MAX_PATH_BONDS {
            return;
        }
        let Some(&last) = path.last() else {
            return;
        };
        let next: Vec<usize> = mol.neighbors(last).map(|(idx, _)| idx).collect();
        for idx in next {
            if on_path[idx] {
                continue;
            }
            path.push(idx);
            on_path[idx] = true;
            self.walk(mol, path, on_path);
            on_path[idx] = false;
            path.pop();
        }
    }

    fn set(&mut self, hash: u64) {
        let bit = (hash % FINGERPRINT_BITS as u64) as usize;
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|word| word.count_ones()).sum()
    }

    /// Whether every bit set in `other` is also set here.
    pub fn contains(&self, other: &Fingerprint) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| theirs & !mine == 0)
    }

    /// Tanimoto coefficient in `[0, 1]`; two empty fingerprints score 0.
    pub fn tanimoto(&self, other: &Fingerprint) -> f64 {
        let (mut both, mut either) = (0u32, 0u32);
        for (a, b) in self.words.iter().zip(other.words.iter()) {
            both += (a & b).count_ones();
            either += (a | b).count_ones();
        }
        if either == 0 {
            0.0
        } else {
            f64::from(both) / f64::from(either)
        }
    }
}

/// Direction-independent hash of a path: the smaller of the forward and reverse hashes.
fn path_hash(mol: &Molecule, path: &[usize]) -> u64 {
    let forward = sequence_hash(mol, path.iter().copied());
    let reverse = sequence_hash(mol, path.iter().rev().copied());
    forward.min(reverse)
}

fn sequence_hash(mol: &Molecule, atoms: impl Iterator<Item = usize>) -> u64 {
    let mut hasher = Fnv1a::default();
    let mut prev: Option<usize> = None;
    for idx in atoms {
        if let Some(prev) = prev {
            if let Some(order) = mol.bond_between(prev, idx) {
                hasher.write(&[b'~', order.molfile_code()]);
            }
        }
        hasher.write(&atom_label(mol.atom(idx)));
        prev = Some(idx);
    }
    hasher.finish()
}

fn atom_label(atom: &Atom) -> [u8; 3] {
    [atom.atomic_number, u8::from(atom.aromatic), atom.charge as u8]
}

/// 64-bit FNV-1a.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fnv1a(u64);

impl Default for Fnv1a {
    fn default() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }
}

impl Fnv1a {
    pub(crate) fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    pub(crate) fn write_u64(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}
