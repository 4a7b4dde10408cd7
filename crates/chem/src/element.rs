/// Element symbols indexed by atomic number (index 0 is the dummy atom `*`).
const SYMBOLS: [&str; 119] = [
    "*", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

pub const DUMMY: u8 = 0;
pub const HYDROGEN: u8 = 1;
pub const CARBON: u8 = 6;
pub const NITROGEN: u8 = 7;
pub const OXYGEN: u8 = 8;
pub const PHOSPHORUS: u8 = 15;
pub const SULFUR: u8 = 16;
pub const SELENIUM: u8 = 34;

/// Atomic number for an element symbol (case-sensitive, `D`/`T` map to hydrogen).
pub fn atomic_number(symbol: &str) -> Option<u8> {
    match symbol {
        "D" | "T" => return Some(HYDROGEN),
        "*" => return None,
        _ => {}
    }
    SYMBOLS
        .iter()
        .position(|candidate| *candidate == symbol)
        .and_then(|idx| u8::try_from(idx).ok())
}

/// Element symbol for an atomic number (`*` for the dummy atom or out of range).
pub fn symbol(atomic_number: u8) -> &'static str {
    SYMBOLS
        .get(usize::from(atomic_number))
        .copied()
        .unwrap_or("*")
}

/// Organic-subset elements, the only ones given implicit hydrogens.
pub fn has_default_valence(atomic_number: u8) -> bool {
    matches!(atomic_number, 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
}

/// Default valences, lowest first. Charged atoms look up the isoelectronic
/// element, so `[N+]` uses carbon's and `[O-]` fluorine's.
pub fn default_valences(atomic_number: u8) -> &'static [u8] {
    match atomic_number {
        5 => &[3],
        6 | 14 => &[4],
        7 | 15 => &[3, 5],
        8 => &[2],
        16 => &[2, 4, 6],
        9 | 17 | 35 | 53 => &[1],
        _ => &[],
    }
}

/// Elements that may be written lowercase (aromatic) in SMILES and SMARTS.
pub fn aromatic_symbol(symbol: &str) -> Option<u8> {
    match symbol {
        "b" => Some(5),
        "c" => Some(CARBON),
        "n" => Some(NITROGEN),
        "o" => Some(OXYGEN),
        "p" => Some(PHOSPHORUS),
        "s" => Some(SULFUR),
        "se" => Some(SELENIUM),
        "as" => Some(33),
        _ => None,
    }
}
