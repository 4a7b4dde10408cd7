use crate::element;
use crate::error::{ChemError, Result};
use crate::mol::{Atom, BondOrder, Molecule};
use crate::stereo::{DoubleBondStereo, TetrahedralCenter};
use std::collections::BTreeMap;

/// Parse a SMILES string into a normalised molecule.
pub fn parse_smiles(input: &str) -> Result<Molecule> {
    let mut mol = SmilesParser::new(input.trim()).parse()?;
    mol.normalize();
    Ok(mol)
}

struct RingOpening {
    atom: usize,
    bond: Option<BondOrder>,
    up: Option<bool>,
    /// Position reserved in the opening atom's neighbour order.
    slot: usize,
}

struct SmilesParser {
    chars: Vec<char>,
    pos: usize,
    mol: Molecule,
    prev: Option<usize>,
    branches: Vec<Option<usize>>,
    pending_bond: Option<BondOrder>,
    /// `/` (up) or `\` (down) on the pending bond.
    pending_up: Option<bool>,
    ring_bonds: BTreeMap<u32, RingOpening>,
    /// Neighbours of each atom in the order written, `None` for a bracket hydrogen.
    neighbor_order: Vec<Vec<Option<usize>>>,
    chirality: Vec<(usize, bool)>,
    /// Directional single bonds as `(written first, written second, up)`.
    directional: Vec<(usize, usize, bool)>,
}

impl SmilesParser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            mol: Molecule::new(source),
            prev: None,
            branches: Vec::new(),
            pending_bond: None,
            pending_up: None,
            ring_bonds: BTreeMap::new(),
            neighbor_order: Vec::new(),
            chirality: Vec::new(),
            directional: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> ChemError {
        ChemError::smiles(self.pos, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse(mut self) -> Result<Molecule> {
        if self.chars.is_empty() {
            return Err(ChemError::EmptyStructure);
        }
        if self.chars.iter().any(|c| c.is_whitespace()) {
            return Err(self.error("whitespace inside SMILES"));
        }

        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    if self.prev.is_none() {
                        return Err(self.error("branch opened before any atom"));
                    }
                    self.branches.push(self.prev);
                    self.pos += 1;
                }
                ')' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error("bond symbol before ')'"));
                    }
                    let Some(prev) = self.branches.pop() else {
                        return Err(self.error("unbalanced ')'"));
                    };
                    self.prev = prev;
                    self.pos += 1;
                }
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error("consecutive bond symbols"));
                    }
                    self.pending_bond = Some(match c {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        ':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    });
                    self.pending_up = match c {
                        '/' => Some(true),
                        '\\' => Some(false),
                        _ => None,
                    };
                    self.pos += 1;
                }
                '.' => {
                    if self.pending_bond.is_some() {
                        return Err(self.error("bond symbol before '.'"));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '%' | '0'..='9' => self.ring_closure()?,
                '[' => {
                    let (atom, clockwise) = self.bracket_atom()?;
                    self.push_atom(atom, clockwise)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.push_atom(atom, None)?;
                }
            }
        }

        if !self.branches.is_empty() {
            return Err(self.error("unclosed branch"));
        }
        if let Some(number) = self.ring_bonds.keys().next() {
            return Err(self.error(format!("unclosed ring {number}")));
        }
        if self.pending_bond.is_some() {
            return Err(self.error("dangling bond symbol"));
        }
        self.record_stereo();
        Ok(self.mol)
    }

    fn push_atom(&mut self, atom: Atom, clockwise: Option<bool>) -> Result<()> {
        let aromatic = atom.aromatic;
        let bracket_hydrogen = atom.fixed_hydrogens && atom.explicit_hydrogens > 0;
        let idx = self.mol.add_atom(atom);
        self.neighbor_order.push(Vec::new());
        if let Some(prev) = self.prev {
            let order = self
                .pending_bond
                .take()
                .unwrap_or_else(|| self.default_bond(prev, aromatic));
            self.mol
                .add_bond(prev, idx, order)
                .map_err(|_| self.error("invalid bond"))?;
            self.neighbor_order[prev].push(Some(idx));
            self.neighbor_order[idx].push(Some(prev));
            if let Some(up) = self.pending_up.take() {
                self.directional.push((prev, idx, up));
            }
        } else if self.pending_bond.is_some() {
            return Err(self.error("bond symbol without a preceding atom"));
        }
        if let Some(clockwise) = clockwise {
            if bracket_hydrogen {
                self.neighbor_order[idx].push(None);
            }
            self.chirality.push((idx, clockwise));
        }
        self.prev = Some(idx);
        Ok(())
    }

    /// Turn `@`/`@@` marks and `/` `\` bonds into stereo descriptors.
    fn record_stereo(&mut self) {
        for &(center, clockwise) in &self.chirality {
            self.mol.add_tetrahedral(TetrahedralCenter {
                center,
                neighbors: self.neighbor_order[center].clone(),
                clockwise,
            });
        }

        let doubles: Vec<(usize, usize)> = self
            .mol
            .bonds()
            .filter(|&(_, _, order)| order == BondOrder::Double)
            .map(|(from, to, _)| (from, to))
            .collect();
        for (from, to) in doubles {
            let (Some((from_ref, from_up)), Some((to_ref, to_up))) =
                (self.side(from, to), self.side(to, from))
            else {
                continue;
            };
            self.mol.add_double_bond_stereo(DoubleBondStereo {
                from,
                to,
                from_ref,
                to_ref,
                trans: from_up != to_up,
            });
        }
    }

    /// First directional bond at `end` (other than to `other`): the
    /// substituent and whether it sits above the double bond.
    fn side(&self, end: usize, other: usize) -> Option<(usize, bool)> {
        self.directional.iter().find_map(|&(first, second, up)| {
            if first == end && second != other {
                Some((second, up))
            } else if second == end && first != other {
                Some((first, !up))
            } else {
                None
            }
        })
    }

    fn default_bond(&self, prev: usize, aromatic: bool) -> BondOrder {
        if aromatic && self.mol.atom(prev).aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn ring_closure(&mut self) -> Result<()> {
        let Some(prev) = self.prev else {
            return Err(self.error("ring closure before any atom"));
        };
        let number = if self.peek() == Some('%') {
            self.pos += 1;
            let digits: String = self.chars[self.pos..]
                .iter()
                .take(2)
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.len() != 2 {
                return Err(self.error("'%' must be followed by two digits"));
            }
            self.pos += 2;
            digits
                .parse::<u32>()
                .map_err(|_| self.error("invalid ring number"))?
        } else {
            let digit = self.peek().and_then(|c| c.to_digit(10)).unwrap_or(0);
            self.pos += 1;
            digit
        };

        let bond = self.pending_bond.take();
        let up = self.pending_up.take();
        match self.ring_bonds.remove(&number) {
            Some(RingOpening {
                atom: opening,
                bond: opening_bond,
                up: opening_up,
                slot,
            }) => {
                let order = match (opening_bond, bond) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(self.error(format!("conflicting bonds for ring {number}")));
                    }
                    (Some(order), _) | (None, Some(order)) => order,
                    (None, None) => {
                        let aromatic = self.mol.atom(prev).aromatic;
                        self.default_bond(opening, aromatic)
                    }
                };
                self.mol
                    .add_bond(opening, prev, order)
                    .map_err(|_| self.error(format!("invalid ring closure {number}")))?;
                self.neighbor_order[opening][slot] = Some(prev);
                self.neighbor_order[prev].push(Some(opening));
                match (up, opening_up) {
                    (Some(up), _) => self.directional.push((prev, opening, up)),
                    (None, Some(up)) => self.directional.push((opening, prev, up)),
                    (None, None) => {}
                }
            }
            None => {
                let slot = self.neighbor_order[prev].len();
                self.neighbor_order[prev].push(None);
                self.ring_bonds.insert(
                    number,
                    RingOpening {
                        atom: prev,
                        bond,
                        up,
                        slot,
                    },
                );
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom> {
        let c = self.peek().unwrap_or(' ');
        let next = self.chars.get(self.pos + 1).copied();
        let (atom, width) = match (c, next) {
            ('C', Some('l')) => (Atom::new(17), 2),
            ('B', Some('r')) => (Atom::new(35), 2),
            ('*', _) => (Atom::new(element::DUMMY), 1),
            ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I', _) => {
                let number = element::atomic_number(&c.to_string())
                    .ok_or_else(|| self.error("unknown element"))?;
                (Atom::new(number), 1)
            }
            ('b' | 'c' | 'n' | 'o' | 'p' | 's', _) => {
                let number = element::aromatic_symbol(&c.to_string())
                    .ok_or_else(|| self.error("unknown aromatic element"))?;
                (Atom::aromatic(number), 1)
            }
            _ => return Err(self.error(format!("unexpected character '{c}'"))),
        };
        self.pos += width;
        Ok(atom)
    }

    fn bracket_atom(&mut self) -> Result<(Atom, Option<bool>)> {
        let close = self.chars[self.pos..]
            .iter()
            .position(|&c| c == ']')
            .map(|offset| self.pos + offset)
            .ok_or_else(|| self.error("unclosed '['"))?;
        self.pos += 1;

        let isotope = self.number();
        let mut atom = self.bracket_symbol()?;
        atom.isotope = isotope.map(|value| value.min(u32::from(u16::MAX)) as u16);
        atom.fixed_hydrogens = true;

        let clockwise = self.chirality()?;
        if self.peek() == Some('H') {
            self.pos += 1;
            let count = self.number().unwrap_or(1);
            atom.explicit_hydrogens = u8::try_from(count).map_err(|_| self.error("too many hydrogens"))?;
        }
        atom.charge = self.charge()?;
        if self.peek() == Some(':') {
            self.pos += 1;
            if self.number().is_none() {
                return Err(self.error("atom class requires a number"));
            }
        }
        if self.pos != close {
            return Err(self.error("unexpected content in bracket atom"));
        }
        self.pos += 1;
        Ok((atom, clockwise))
    }

    /// `@` is anticlockwise, `@@` clockwise. Classes other than `TH` are
    /// accepted and ignored.
    fn chirality(&mut self) -> Result<Option<bool>> {
        let mut marks = 0;
        while self.peek() == Some('@') {
            marks += 1;
            self.pos += 1;
        }
        if marks == 0 {
            return Ok(None);
        }
        let class: String = self.chars[self.pos..].iter().take(2).collect();
        if matches!(class.as_str(), "TH" | "AL" | "SP" | "TB" | "OH") {
            self.pos += 2;
            let number = self
                .number()
                .ok_or_else(|| self.error("chirality class requires a number"))?;
            return Ok(match (class.as_str(), number) {
                ("TH", 1) => Some(false),
                ("TH", 2) => Some(true),
                _ => None,
            });
        }
        match marks {
            1 => Ok(Some(false)),
            2 => Ok(Some(true)),
            _ => Err(self.error("too many '@'")),
        }
    }

    fn bracket_symbol(&mut self) -> Result<Atom> {
        let first = self.peek().ok_or_else(|| self.error("empty bracket atom"))?;
        if first == '*' {
            self.pos += 1;
            return Ok(Atom::new(element::DUMMY));
        }
        let second = self.chars.get(self.pos + 1).copied();

        if first.is_ascii_uppercase() {
            if let Some(lower) = second.filter(|c| c.is_ascii_lowercase()) {
                let two: String = [first, lower].iter().collect();
                if let Some(number) = element::atomic_number(&two) {
                    self.pos += 2;
                    return Ok(Atom::new(number));
                }
            }
            let number = element::atomic_number(&first.to_string())
                .ok_or_else(|| self.error(format!("unknown element '{first}'")))?;
            self.pos += 1;
            return Ok(Atom::new(number));
        }

        if let Some(lower) = second.filter(|c| c.is_ascii_lowercase()) {
            let two: String = [first, lower].iter().collect();
            if let Some(number) = element::aromatic_symbol(&two) {
                self.pos += 2;
                return Ok(Atom::aromatic(number));
            }
        }
        let number = element::aromatic_symbol(&first.to_string())
            .ok_or_else(|| self.error(format!("unknown aromatic element '{first}'")))?;
        self.pos += 1;
        Ok(Atom::aromatic(number))
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn charge(&mut self) -> Result<i8> {
        let sign = match self.peek() {
            Some('+') => 1,
            Some('-') => -1,
            _ => return Ok(0),
        };
        let symbol = self.peek().unwrap_or('+');
        self.pos += 1;
        let magnitude = if let Some(value) = self.number() {
            value
        } else {
            let mut count = 1;
            while self.peek() == Some(symbol) {
                count += 1;
                self.pos += 1;
            }
            count
        };
        let magnitude = i8::try_from(magnitude).map_err(|_| self.error("charge out of range"))?;
        Ok(sign * magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_chain_with_branches() {
        let mol = parse_smiles("CC(=O)O").expect("valid smiles");
        assert_eq!(mol.atom_count(), 4);
        assert_eq!(mol.bond_count(), 3);
        assert_eq!(mol.bond_between(1, 2), Some(BondOrder::Double));
        assert_eq!(mol.bond_between(1, 3), Some(BondOrder::Single));
    }

    #[test]
    fn parses_bracket_atoms() {
        let mol = parse_smiles("[13CH3][N+](C)(C)C.[Cl-]").expect("valid smiles");
        assert_eq!(mol.atom(0).isotope, Some(13));
        assert_eq!(mol.atom(0).explicit_hydrogens, 3);
        assert_eq!(mol.atom(1).charge, 1);
        assert_eq!(mol.atom(5).atomic_number, 17);
        assert_eq!(mol.atom(5).charge, -1);
        assert_eq!(mol.net_charge(), 0);
    }

    #[test]
    fn parses_two_letter_elements() {
        let mol = parse_smiles("ClCBr").expect("valid smiles");
        assert_eq!(mol.atom(0).atomic_number, 17);
        assert_eq!(mol.atom(2).atomic_number, 35);
    }

    #[test]
    fn parses_percent_ring_closures() {
        let mol = parse_smiles("C%12CCCCC%12").expect("valid smiles");
        assert_eq!(mol.bond_count(), 6);
        assert_eq!(mol.rings().len(), 1);
    }

    #[test]
    fn multi_char_charges() {
        let mol = parse_smiles("[Fe++]").expect("valid smiles");
        assert_eq!(mol.atom(0).charge, 2);
        let mol = parse_smiles("[O-2]").expect("valid smiles");
        assert_eq!(mol.atom(0).charge, -2);
    }

    #[test]
    fn chirality_keeps_the_written_neighbour_order() {
        let mol = parse_smiles("N[C@@H](C)C(=O)O").expect("valid smiles");
        let center = &mol.tetrahedral_centers()[0];
        assert_eq!(center.center, 1);
        assert_eq!(center.neighbors, vec![Some(0), None, Some(2), Some(3)]);
        assert!(center.clockwise);

        // A ring bond takes the position of its digit, not of the closing atom.
        let mol = parse_smiles("F[C@]1(Cl)CCC1").expect("valid smiles");
        let center = &mol.tetrahedral_centers()[0];
        assert_eq!(center.neighbors, vec![Some(0), Some(5), Some(2), Some(3)]);
        assert!(!center.clockwise);

        let mol = parse_smiles("F[C@TH2](Cl)(Br)I").expect("valid smiles");
        assert!(mol.tetrahedral_centers()[0].clockwise);
    }

    #[test]
    fn bond_directions_become_double_bond_geometry() {
        let trans = parse_smiles("C/C=C/C").expect("valid smiles");
        assert_eq!(trans.double_bond_stereo().len(), 1);
        assert!(trans.double_bond_stereo()[0].trans);

        let written_in_branch = parse_smiles("C(/C)=C/C").expect("valid smiles");
        assert!(!written_in_branch.double_bond_stereo()[0].trans);

        let unmarked = parse_smiles("CC=CC").expect("valid smiles");
        assert!(unmarked.double_bond_stereo().is_empty());
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "C(", "C)", "C1CC", "C==C", "Xy", "[C", "C=", "(C)", "C C", "[C@@@H]"] {
            assert!(parse_smiles(bad).is_err(), "{bad:?} should fail");
        }
    }
}
