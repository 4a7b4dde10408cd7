//! Query graphs: SMARTS patterns and exact-structure queries.

use crate::element;
use crate::error::{ChemError, Result};
use crate::mol::{BondOrder, Molecule};
use std::collections::BTreeMap;

/// Boolean combination of primitive tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<P> {
    Primitive(P),
    Not(Box<Expr<P>>),
    And(Vec<Expr<P>>),
    Or(Vec<Expr<P>>),
}

impl<P> Expr<P> {
    pub fn eval(&self, test: &impl Fn(&P) -> bool) -> bool {
        match self {
            Self::Primitive(primitive) => test(primitive),
            Self::Not(inner) => !inner.eval(test),
            Self::And(terms) => terms.iter().all(|term| term.eval(test)),
            Self::Or(terms) => terms.iter().any(|term| term.eval(test)),
        }
    }

    fn and(mut terms: Vec<Self>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Self::And(terms)
        }
    }

    fn or(mut terms: Vec<Self>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Self::Or(terms)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomPrimitive {
    Any,
    /// Element, optionally restricted to aromatic (`Some(true)`) or aliphatic form.
    Element { number: u8, aromatic: Option<bool> },
    Aromatic,
    Aliphatic,
    Charge(i8),
    Isotope(u16),
    /// Number of explicit connections.
    Degree(u8),
    /// Attached hydrogens, implicit and explicit.
    Hydrogens(u8),
    /// Connections including hydrogens.
    Connectivity(u8),
    InRing(bool),
    /// Size of the smallest ring through the atom.
    SmallestRing(u8),
    /// The hydrogen atom itself (`[H]`, `[2H]`, `[H+]`).
    Hydrogen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondPrimitive {
    Any,
    /// Unspecified bond: single or aromatic.
    Default,
    Order(BondOrder),
    InRing,
}

pub type AtomExpr = Expr<AtomPrimitive>;
pub type BondExpr = Expr<BondPrimitive>;

impl AtomExpr {
    pub fn matches(&self, mol: &Molecule, idx: usize) -> bool {
        let atom = mol.atom(idx);
        self.eval(&|primitive: &AtomPrimitive| match *primitive {
            AtomPrimitive::Any => true,
            AtomPrimitive::Element { number, aromatic } => {
                atom.atomic_number == number && aromatic.map_or(true, |flag| flag == atom.aromatic)
            }
            AtomPrimitive::Aromatic => atom.aromatic,
            AtomPrimitive::Aliphatic => !atom.aromatic,
            AtomPrimitive::Charge(charge) => atom.charge == charge,
            AtomPrimitive::Isotope(isotope) => atom.isotope == Some(isotope),
            AtomPrimitive::Degree(degree) => mol.degree(idx) == usize::from(degree),
            AtomPrimitive::Hydrogens(count) => mol.total_hydrogens(idx) == count,
            AtomPrimitive::Connectivity(count) => {
                mol.degree(idx) + usize::from(mol.total_hydrogens(idx)) == usize::from(count)
            }
            AtomPrimitive::InRing(in_ring) => mol.is_ring_atom(idx) == in_ring,
            AtomPrimitive::SmallestRing(size) => {
                mol.smallest_ring_size(idx) == Some(usize::from(size))
            }
            AtomPrimitive::Hydrogen => atom.atomic_number == element::HYDROGEN,
        })
    }
}

impl BondExpr {
    pub fn matches(&self, mol: &Molecule, from: usize, to: usize, order: BondOrder) -> bool {
        self.eval(&|primitive: &BondPrimitive| match *primitive {
            BondPrimitive::Any => true,
            BondPrimitive::Default => matches!(order, BondOrder::Single | BondOrder::Aromatic),
            BondPrimitive::Order(expected) => order == expected,
            BondPrimitive::InRing => mol.is_ring_bond(from, to),
        })
    }
}

/// Query graph matched against molecules by substructure search.
#[derive(Debug, Clone, Default)]
pub struct QueryMol {
    atoms: Vec<AtomExpr>,
    bonds: Vec<(usize, usize, BondExpr)>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl QueryMol {
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn atom(&self, idx: usize) -> &AtomExpr {
        &self.atoms[idx]
    }

    pub fn bonds(&self) -> &[(usize, usize, BondExpr)] {
        &self.bonds
    }

    /// Neighbours of a query atom with the connecting bond expression.
    pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = (usize, &BondExpr)> + '_ {
        self.adjacency[idx]
            .iter()
            .map(move |&(other, bond)| (other, &self.bonds[bond].2))
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.adjacency[idx].len()
    }

    fn add_atom(&mut self, expr: AtomExpr) -> usize {
        self.atoms.push(expr);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    fn add_bond(&mut self, from: usize, to: usize, expr: BondExpr) -> bool {
        if from == to || self.adjacency[from].iter().any(|&(other, _)| other == to) {
            return false;
        }
        let bond = self.bonds.len();
        self.bonds.push((from, to, expr));
        self.adjacency[from].push((to, bond));
        self.adjacency[to].push((from, bond));
        true
    }

    /// Exact-structure query: element, aromaticity and charge per atom, exact bond orders.
    pub fn from_molecule(mol: &Molecule) -> Self {
        let mut query = Self::default();
        for atom in mol.atoms() {
            query.add_atom(Expr::And(vec![
                Expr::Primitive(AtomPrimitive::Element {
                    number: atom.atomic_number,
                    aromatic: Some(atom.aromatic),
                }),
                Expr::Primitive(AtomPrimitive::Charge(atom.charge)),
            ]));
        }
        for (from, to, order) in mol.bonds() {
            query.add_bond(from, to, Expr::Primitive(BondPrimitive::Order(order)));
        }
        query
    }
}

/// Parse a SMARTS pattern.
///
/// Supported: `*`, `a`, `A`, `#n`, element symbols, isotopes, charges, `D<n>`,
/// `H<n>`, `X<n>`, `R`/`R0`, `r`/`r<n>`, the operators `! & , ;` and bond
/// primitives `- = # : ~ @`. Recursive SMARTS, implicit-hydrogen (`h`),
/// valence (`v`), ring connectivity (`x`) and chirality are rejected.
pub fn parse_smarts(input: &str) -> Result<QueryMol> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ChemError::EmptyStructure);
    }
    SmartsParser {
        chars: input.chars().collect(),
        pos: 0,
        query: QueryMol::default(),
        bracket_start: 0,
    }
    .parse()
}

struct SmartsParser {
    chars: Vec<char>,
    pos: usize,
    query: QueryMol,
    /// Position just inside the current `[`.
    bracket_start: usize,
}

const BOND_CHARS: &[char] = &['-', '=', '#', ':', '~', '@', '!', '&', ',', ';', '/', '\\'];

impl SmartsParser {
    fn error(&self, message: impl Into<String>) -> ChemError {
        ChemError::smarts(self.pos, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn parse(mut self) -> Result<QueryMol> {
        let mut prev: Option<usize> = None;
        let mut branches: Vec<Option<usize>> = Vec::new();
        let mut pending: Option<BondExpr> = None;
        let mut rings: BTreeMap<u32, (usize, Option<BondExpr>)> = BTreeMap::new();

        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    if prev.is_none() {
                        return Err(self.error("branch opened before any atom"));
                    }
                    branches.push(prev);
                    self.pos += 1;
                }
                ')' => {
                    if pending.is_some() {
                        return Err(self.error("bond before ')'"));
                    }
                    prev = branches.pop().ok_or_else(|| self.error("unbalanced ')'"))?;
                    self.pos += 1;
                }
                '.' => {
                    if pending.is_some() {
                        return Err(self.error("bond before '.'"));
                    }
                    prev = None;
                    self.pos += 1;
                }
                c if BOND_CHARS.contains(&c) => {
                    if pending.is_some() {
                        return Err(self.error("consecutive bond expressions"));
                    }
                    pending = Some(self.bond_expr()?);
                }
                '%' | '0'..='9' => {
                    let Some(atom) = prev else {
                        return Err(self.error("ring closure before any atom"));
                    };
                    let number = self.ring_number()?;
                    let bond = pending.take();
                    match rings.remove(&number) {
                        Some((opening, opening_bond)) => {
                            let expr = bond
                                .or(opening_bond)
                                .unwrap_or(Expr::Primitive(BondPrimitive::Default));
                            if !self.query.add_bond(opening, atom, expr) {
                                return Err(self.error(format!("invalid ring closure {number}")));
                            }
                        }
                        None => {
                            rings.insert(number, (atom, bond));
                        }
                    }
                }
                _ => {
                    let expr = if c == '[' {
                        self.bracket_atom()?
                    } else {
                        self.bare_atom()?
                    };
                    let atom = self.query.add_atom(expr);
                    if let Some(prev) = prev {
                        let bond = pending
                            .take()
                            .unwrap_or(Expr::Primitive(BondPrimitive::Default));
                        self.query.add_bond(prev, atom, bond);
                    } else if pending.is_some() {
                        return Err(self.error("bond without a preceding atom"));
                    }
                    prev = Some(atom);
                }
            }
        }

        if !branches.is_empty() {
            return Err(self.error("unclosed branch"));
        }
        if let Some(number) = rings.keys().next() {
            return Err(self.error(format!("unclosed ring {number}")));
        }
        if pending.is_some() {
            return Err(self.error("dangling bond"));
        }
        if self.query.atom_count() == 0 {
            return Err(ChemError::EmptyStructure);
        }
        Ok(self.query)
    }

    fn ring_number(&mut self) -> Result<u32> {
        if self.peek() == Some('%') {
            self.pos += 1;
            let (Some(a), Some(b)) = (
                self.peek().and_then(|c| c.to_digit(10)),
                self.peek_at(1).and_then(|c| c.to_digit(10)),
            ) else {
                return Err(self.error("'%' must be followed by two digits"));
            };
            self.pos += 2;
            return Ok(a * 10 + b);
        }
        let digit = self
            .peek()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| self.error("expected ring number"))?;
        self.pos += 1;
        Ok(digit)
    }

    fn bare_atom(&mut self) -> Result<AtomExpr> {
        let c = self.peek().unwrap_or(' ');
        let next = self.peek_at(1);
        let (primitive, width) = match (c, next) {
            ('C', Some('l')) => (aliphatic(17), 2),
            ('B', Some('r')) => (aliphatic(35), 2),
            ('*', _) => (AtomPrimitive::Any, 1),
            ('a', _) => (AtomPrimitive::Aromatic, 1),
            ('A', _) => (AtomPrimitive::Aliphatic, 1),
            ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I', _) => {
                let number = element::atomic_number(&c.to_string())
                    .ok_or_else(|| self.error("unknown element"))?;
                (aliphatic(number), 1)
            }
            ('b' | 'c' | 'n' | 'o' | 'p' | 's', _) => {
                let number = element::aromatic_symbol(&c.to_string())
                    .ok_or_else(|| self.error("unknown aromatic element"))?;
                (aromatic(number), 1)
            }
            _ => return Err(self.error(format!("unexpected character '{c}'"))),
        };
        self.pos += width;
        Ok(Expr::Primitive(primitive))
    }

    fn bracket_atom(&mut self) -> Result<AtomExpr> {
        self.pos += 1;
        self.bracket_start = self.pos;
        let expr = self.low_and(Self::atom_primitive)?;
        if self.peek() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        self.pos += 1;
        Ok(expr)
    }

    fn bond_expr(&mut self) -> Result<BondExpr> {
        self.low_and(Self::bond_primitive)
    }

    /// `a;b` binds loosest, then `a,b`, then `a&b` or adjacency, then `!a`.
    fn low_and<P>(&mut self, primitive: fn(&mut Self) -> Result<Option<P>>) -> Result<Expr<P>> {
        let mut terms = vec![self.or_expr(primitive)?];
        while self.peek() == Some(';') {
            self.pos += 1;
            terms.push(self.or_expr(primitive)?);
        }
        Ok(Expr::and(terms))
    }

    fn or_expr<P>(&mut self, primitive: fn(&mut Self) -> Result<Option<P>>) -> Result<Expr<P>> {
        let mut terms = vec![self.and_expr(primitive)?];
        while self.peek() == Some(',') {
            self.pos += 1;
            terms.push(self.and_expr(primitive)?);
        }
        Ok(Expr::or(terms))
    }

    fn and_expr<P>(&mut self, primitive: fn(&mut Self) -> Result<Option<P>>) -> Result<Expr<P>> {
        let mut terms = vec![self.unary(primitive)?];
        loop {
            if self.peek() == Some('&') {
                self.pos += 1;
                terms.push(self.unary(primitive)?);
                continue;
            }
            let start = self.pos;
            match self.unary_opt(primitive)? {
                Some(term) => terms.push(term),
                None => {
                    self.pos = start;
                    break;
                }
            }
        }
        Ok(Expr::and(terms))
    }

    fn unary<P>(&mut self, primitive: fn(&mut Self) -> Result<Option<P>>) -> Result<Expr<P>> {
        self.unary_opt(primitive)?
            .ok_or_else(|| self.error("expected a primitive"))
    }

    fn unary_opt<P>(
        &mut self,
        primitive: fn(&mut Self) -> Result<Option<P>>,
    ) -> Result<Option<Expr<P>>> {
        if self.peek() == Some('!') {
            self.pos += 1;
            let inner = self.unary(primitive)?;
            return Ok(Some(Expr::Not(Box::new(inner))));
        }
        Ok(primitive(self)?.map(Expr::Primitive))
    }

    fn bond_primitive(&mut self) -> Result<Option<BondPrimitive>> {
        let primitive = match self.peek() {
            Some('-' | '/' | '\\') => BondPrimitive::Order(BondOrder::Single),
            Some('=') => BondPrimitive::Order(BondOrder::Double),
            Some('#') => BondPrimitive::Order(BondOrder::Triple),
            Some(':') => BondPrimitive::Order(BondOrder::Aromatic),
            Some('~') => BondPrimitive::Any,
            Some('@') => BondPrimitive::InRing,
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(primitive))
    }

    fn atom_primitive(&mut self) -> Result<Option<AtomPrimitive>> {
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let next = self.peek_at(1);

        if c.is_ascii_uppercase() {
            if let Some(lower) = next.filter(|n| n.is_ascii_lowercase()) {
                let two: String = [c, lower].iter().collect();
                if let Some(number) = element::atomic_number(&two) {
                    self.pos += 2;
                    return Ok(Some(aliphatic(number)));
                }
            }
        }

        let primitive = match c {
            '*' => {
                self.pos += 1;
                AtomPrimitive::Any
            }
            '#' => {
                self.pos += 1;
                let number = self
                    .number()
                    .ok_or_else(|| self.error("'#' requires an atomic number"))?;
                let number = u8::try_from(number).map_err(|_| self.error("atomic number out of range"))?;
                AtomPrimitive::Element {
                    number,
                    aromatic: None,
                }
            }
            'a' if next == Some('s') => {
                self.pos += 2;
                aromatic(33)
            }
            'a' => {
                self.pos += 1;
                AtomPrimitive::Aromatic
            }
            'A' => {
                self.pos += 1;
                AtomPrimitive::Aliphatic
            }
            'D' => {
                self.pos += 1;
                let degree = self.number().unwrap_or(1);
                AtomPrimitive::Degree(u8::try_from(degree).map_err(|_| self.error("degree out of range"))?)
            }
            'R' => {
                self.pos += 1;
                AtomPrimitive::InRing(self.number() != Some(0))
            }
            '+' | '-' => AtomPrimitive::Charge(self.charge()?),
            '0'..='9' => {
                let isotope = self.number().unwrap_or(0);
                AtomPrimitive::Isotope(u16::try_from(isotope).map_err(|_| self.error("isotope out of range"))?)
            }
            'H' if self.is_hydrogen_atom() => {
                self.pos += 1;
                AtomPrimitive::Hydrogen
            }
            'H' => {
                self.pos += 1;
                let count = self.number().unwrap_or(1);
                AtomPrimitive::Hydrogens(u8::try_from(count).map_err(|_| self.error("hydrogen count out of range"))?)
            }
            'X' => {
                self.pos += 1;
                let count = self.number().unwrap_or(1);
                AtomPrimitive::Connectivity(u8::try_from(count).map_err(|_| self.error("connectivity out of range"))?)
            }
            'r' => {
                self.pos += 1;
                match self.number() {
                    None => AtomPrimitive::InRing(true),
                    Some(0) => AtomPrimitive::InRing(false),
                    Some(size) => AtomPrimitive::SmallestRing(
                        u8::try_from(size).map_err(|_| self.error("ring size out of range"))?,
                    ),
                }
            }
            '$' => return Err(self.error("recursive SMARTS is not supported")),
            'h' => return Err(self.error("implicit hydrogen primitives are not supported")),
            '@' => return Err(self.error("chirality is not supported")),
            'x' | 'v' => return Err(self.error(format!("primitive '{c}' is not supported"))),
            c if c.is_ascii_uppercase() => {
                let number = element::atomic_number(&c.to_string())
                    .ok_or_else(|| self.error(format!("unknown element '{c}'")))?;
                self.pos += 1;
                aliphatic(number)
            }
            c if c.is_ascii_lowercase() => {
                if let Some(lower) = next.filter(|n| n.is_ascii_lowercase()) {
                    let two: String = [c, lower].iter().collect();
                    if let Some(number) = element::aromatic_symbol(&two) {
                        self.pos += 2;
                        return Ok(Some(aromatic(number)));
                    }
                }
                let number = element::aromatic_symbol(&c.to_string())
                    .ok_or_else(|| self.error(format!("unknown aromatic element '{c}'")))?;
                self.pos += 1;
                aromatic(number)
            }
            _ => return Ok(None),
        };
        Ok(Some(primitive))
    }

    /// `H` names the element when it opens the bracket (or follows an
    /// isotope) and nothing but a charge or `]` comes after it.
    fn is_hydrogen_atom(&self) -> bool {
        let opens = self.chars[self.bracket_start..self.pos]
            .iter()
            .all(|c| c.is_ascii_digit());
        opens && matches!(self.peek_at(1), Some(']' | '+' | '-'))
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.chars[start..self.pos].iter().collect::<String>().parse().ok()
    }

    fn charge(&mut self) -> Result<i8> {
        let symbol = self.peek().unwrap_or('+');
        let sign = if symbol == '-' { -1 } else { 1 };
        self.pos += 1;
        let magnitude = match self.number() {
            Some(value) => value,
            None => {
                let mut count = 1;
                while self.peek() == Some(symbol) {
                    count += 1;
                    self.pos += 1;
                }
                count
            }
        };
        let magnitude = i8::try_from(magnitude).map_err(|_| self.error("charge out of range"))?;
        Ok(sign * magnitude)
    }
}

fn aliphatic(number: u8) -> AtomPrimitive {
    AtomPrimitive::Element {
        number,
        aromatic: Some(false),
    }
}

fn aromatic(number: u8) -> AtomPrimitive {
    AtomPrimitive::Element {
        number,
        aromatic: Some(true),
    }
}
