//! MDL molfile (V2000) reading and writing.

use crate::element;
use crate::error::{ChemError, Result};
use crate::mol::{Atom, BondOrder, Molecule};
use crate::stereo;
use std::fmt::Write as _;

const COUNTS_LINE: usize = 3;

/// Parse a V2000 mol block. Anything after `M  END` is ignored.
pub fn parse_molfile(text: &str) -> Result<Molecule> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= COUNTS_LINE {
        return Err(ChemError::molfile(lines.len() + 1, "missing counts line"));
    }

    let counts = lines[COUNTS_LINE];
    if counts.contains("V3000") {
        return Err(ChemError::molfile(COUNTS_LINE + 1, "V3000 molfiles are not supported"));
    }
    let atom_count = parse_count(counts, 0, 3, COUNTS_LINE)?;
    let bond_count = parse_count(counts, 3, 6, COUNTS_LINE)?;
    if atom_count == 0 {
        return Err(ChemError::EmptyStructure);
    }

    let mut mol = Molecule::new(lines[0].trim());
    let atom_start = COUNTS_LINE + 1;
    for offset in 0..atom_count {
        let line_no = atom_start + offset;
        let line = lines
            .get(line_no)
            .ok_or_else(|| ChemError::molfile(line_no + 1, "atom block is truncated"))?;
        mol.add_atom(parse_atom_line(line, line_no)?);
    }

    let bond_start = atom_start + atom_count;
    let mut wedges = Vec::new();
    let mut unspecified = Vec::new();
    for offset in 0..bond_count {
        let line_no = bond_start + offset;
        let line = lines
            .get(line_no)
            .ok_or_else(|| ChemError::molfile(line_no + 1, "bond block is truncated"))?;
        let from = parse_count(line, 0, 3, line_no)?;
        let to = parse_count(line, 3, 6, line_no)?;
        let code = parse_count(line, 6, 9, line_no)?;
        let order = u8::try_from(code)
            .ok()
            .and_then(BondOrder::from_molfile_code)
            .ok_or_else(|| ChemError::molfile(line_no + 1, format!("unsupported bond type {code}")))?;
        if from == 0 || to == 0 {
            return Err(ChemError::molfile(line_no + 1, "bond references atom 0"));
        }
        mol.add_bond(from - 1, to - 1, order)
            .map_err(|err| ChemError::molfile(line_no + 1, err.to_string()))?;
        match (order, field(line, 9, 12)) {
            (BondOrder::Single, "1") => wedges.push((from - 1, to - 1, true)),
            (BondOrder::Single, "6") => wedges.push((from - 1, to - 1, false)),
            (BondOrder::Double, "3") => unspecified.push((from - 1, to - 1)),
            _ => {}
        }
    }

    let mut charges_reset = false;
    for (line_no, line) in lines.iter().enumerate().skip(bond_start + bond_count) {
        if line.starts_with("M  END") {
            break;
        }
        if line.starts_with("M  CHG") {
            // The first CHG line supersedes every charge given in the atom block.
            if !charges_reset {
                for idx in 0..mol.atom_count() {
                    mol.atom_mut(idx).charge = 0;
                }
                charges_reset = true;
            }
            for (idx, value) in property_pairs(line, line_no, mol.atom_count())? {
                mol.atom_mut(idx).charge = i8::try_from(value)
                    .map_err(|_| ChemError::molfile(line_no + 1, "charge out of range"))?;
            }
        } else if line.starts_with("M  ISO") {
            for (idx, value) in property_pairs(line, line_no, mol.atom_count())? {
                mol.atom_mut(idx).isotope = u16::try_from(value).ok();
            }
        }
    }

    stereo::perceive_from_coordinates(&mut mol, &wedges, &unspecified);
    mol.normalize();
    Ok(mol)
}

/// Split an SD file into its mol blocks (the text before each `$$$$`).
pub fn sdf_records(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.split("$$$$")
        .map(|record| {
            record
                .strip_prefix("\r\n")
                .or_else(|| record.strip_prefix('\n'))
                .unwrap_or(record)
        })
        .filter(|record| !record.trim().is_empty())
}

/// Render a molecule as a V2000 mol block terminated by `M  END`.
pub fn write_molfile(mol: &Molecule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", mol.name);
    let _ = writeln!(out, "  chemsearch");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
        mol.atom_count(),
        mol.bond_count()
    );

    let mut charged = Vec::new();
    let mut isotopes = Vec::new();
    for (idx, atom) in mol.atoms().enumerate() {
        let [x, y, z] = atom.position;
        let _ = writeln!(
            out,
            "{x:>10.4}{y:>10.4}{z:>10.4} {:<3} 0{:>3}  0  0  0  0  0  0  0  0  0  0",
            atom.symbol(),
            charge_code(atom.charge)
        );
        if atom.charge != 0 {
            charged.push((idx + 1, i32::from(atom.charge)));
        }
        if let Some(isotope) = atom.isotope {
            isotopes.push((idx + 1, i32::from(isotope)));
        }
    }
    for (from, to, order) in mol.bonds() {
        let _ = writeln!(out, "{:>3}{:>3}{:>3}  0", from + 1, to + 1, order.molfile_code());
    }
    write_property(&mut out, "CHG", &charged);
    write_property(&mut out, "ISO", &isotopes);
    out.push_str("M  END\n");
    out
}

fn write_property(out: &mut String, tag: &str, entries: &[(usize, i32)]) {
    for chunk in entries.chunks(8) {
        let _ = write!(out, "M  {tag}{:>3}", chunk.len());
        for (idx, value) in chunk {
            let _ = write!(out, " {idx:>3} {value:>3}");
        }
        out.push('\n');
    }
}

fn parse_atom_line(line: &str, line_no: usize) -> Result<Atom> {
    let coord = |start: usize| -> Result<f64> {
        let text = field(line, start, start + 10);
        if text.is_empty() {
            return Ok(0.0);
        }
        text.parse()
            .map_err(|_| ChemError::molfile(line_no + 1, format!("bad coordinate '{text}'")))
    };
    let position = [coord(0)?, coord(10)?, coord(20)?];

    let symbol = field(line, 31, 34);
    let atomic_number = element::atomic_number(symbol).ok_or_else(|| {
        ChemError::molfile(line_no + 1, format!("unsupported atom symbol '{symbol}'"))
    })?;

    let mut atom = Atom::new(atomic_number);
    atom.position = position;
    atom.isotope = match symbol {
        "D" => Some(2),
        "T" => Some(3),
        _ => None,
    };
    let code = field(line, 36, 39);
    atom.charge = match code {
        "" | "0" | "4" => 0,
        "1" => 3,
        "2" => 2,
        "3" => 1,
        "5" => -1,
        "6" => -2,
        "7" => -3,
        other => {
            return Err(ChemError::molfile(
                line_no + 1,
                format!("unknown charge code '{other}'"),
            ))
        }
    };
    Ok(atom)
}

fn charge_code(charge: i8) -> u8 {
    match charge {
        3 => 1,
        2 => 2,
        1 => 3,
        -1 => 5,
        -2 => 6,
        -3 => 7,
        _ => 0,
    }
}

/// `(atom index, value)` pairs of an `M  CHG`/`M  ISO` line, zero-based.
fn property_pairs(line: &str, line_no: usize, atom_count: usize) -> Result<Vec<(usize, i32)>> {
    let bad = |message: &str| ChemError::molfile(line_no + 1, message.to_string());
    let mut tokens = line[6..].split_whitespace();
    let count: usize = tokens
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| bad("missing entry count"))?;

    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let atom: usize = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| bad("missing atom number"))?;
        let value: i32 = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| bad("missing property value"))?;
        if atom == 0 || atom > atom_count {
            return Err(bad("property references unknown atom"));
        }
        pairs.push((atom - 1, value));
    }
    Ok(pairs)
}

fn parse_count(line: &str, start: usize, end: usize, line_no: usize) -> Result<usize> {
    let text = field(line, start, end);
    text.parse()
        .map_err(|_| ChemError::molfile(line_no + 1, format!("expected a number, found '{text}'")))
}

/// Fixed-width column, trimmed. Short lines yield an empty field.
fn field(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start..end).map(str::trim).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::IdentityKey;
    use crate::smiles::parse_smiles;
    use pretty_assertions::assert_eq;

    const ETHANOL: &str = "ethanol
  test

  3  2  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.2500    1.2990    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
M  END
";

    #[test]
    fn reads_atoms_and_bonds() {
        let mol = parse_molfile(ETHANOL).expect("valid molfile");
        assert_eq!(mol.name, "ethanol");
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.atom(2).atomic_number, 8);
        assert_eq!(mol.atom(2).position, [2.25, 1.299, 0.0]);
        assert_eq!(mol.bond_between(1, 2), Some(BondOrder::Single));
    }

    #[test]
    fn chg_block_overrides_atom_block() {
        let text = "acetate

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  3  0  0  0  0  0  0  0  0  0  0
    1.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
M  CHG  1   2  -1
M  ISO  1   1  13
M  END
";
        let mol = parse_molfile(text).expect("valid molfile");
        assert_eq!(mol.atom(0).charge, 0);
        assert_eq!(mol.atom(1).charge, -1);
        assert_eq!(mol.atom(0).isotope, Some(13));
    }

    #[test]
    fn rejects_v3000_and_truncated_blocks() {
        let v3000 = "x\n\n\n  0  0  0     0  0            999 V3000\nM  END\n";
        assert!(matches!(parse_molfile(v3000), Err(ChemError::Molfile { .. })));

        let truncated: String = ETHANOL.lines().take(5).collect::<Vec<_>>().join("\n");
        assert!(parse_molfile(&truncated).is_err());
        assert!(parse_molfile("just a line").is_err());
    }

    #[test]
    fn rejects_query_atoms() {
        let text = ETHANOL.replace(" O   0", " R#  0");
        assert!(parse_molfile(&text).is_err());
    }

    #[test]
    fn written_block_reads_back() {
        let mut mol = parse_molfile(ETHANOL).expect("valid molfile");
        mol.atom_mut(2).charge = -1;
        let text = write_molfile(&mol);
        assert!(text.contains("M  CHG  1   3  -1"));
        let again = parse_molfile(&text).expect("valid molfile");
        assert_eq!(again.atom_count(), 3);
        assert_eq!(again.atom(2).charge, -1);
        assert_eq!(again.bond_count(), 2);
    }

    fn butene(methyl_x: f64, methyl_y: f64) -> String {
        format!(
            "butene

  4  3  0  0  0  0  0  0  0  0999 V2000
   -1.2990    0.7500    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.2990    0.7500    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
{methyl_x:>10.4}{methyl_y:>10.4}    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  2  0
  3  4  1  0
M  END
"
        )
    }

    #[test]
    fn drawn_double_bond_geometry_matches_smiles() {
        let trans = parse_molfile(&butene(2.5981, 0.0)).expect("trans butene");
        let cis = parse_molfile(&butene(1.299, 2.25)).expect("cis butene");
        assert!(trans.double_bond_stereo()[0].trans);
        assert!(!cis.double_bond_stereo()[0].trans);
        assert_eq!(
            IdentityKey::of(&trans),
            IdentityKey::of(&parse_smiles("C/C=C/C").expect("valid smiles"))
        );
        assert_eq!(
            IdentityKey::of(&cis),
            IdentityKey::of(&parse_smiles("C/C=C\\C").expect("valid smiles"))
        );
    }

    #[test]
    fn wedge_bonds_define_stereocentres() {
        // Alanine drawn with the amino group on a wedge or on a hash.
        let alanine = |stereo: &str| {
            format!(
                "alanine

  6  5  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -1.2990   -0.7500    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000    1.5000    0.0000 N   0  0  0  0  0  0  0  0  0  0  0  0
    1.2990   -0.7500    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.5981    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    1.2990   -2.2500    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  1  3  1  {stereo}
  1  4  1  0
  4  5  2  0
  4  6  1  0
M  END
"
            )
        };
        let wedged = IdentityKey::of(&parse_molfile(&alanine("1")).expect("wedged"));
        let hashed = IdentityKey::of(&parse_molfile(&alanine("6")).expect("hashed"));
        let flat = IdentityKey::of(&parse_molfile(&alanine("0")).expect("flat"));
        assert_ne!(wedged, hashed);
        assert_eq!(wedged.skeleton(), hashed.skeleton());
        assert_eq!(flat, IdentityKey::of(&parse_smiles("CC(N)C(=O)O").expect("valid smiles")));

        let l = IdentityKey::of(&parse_smiles("C[C@H](N)C(=O)O").expect("valid smiles"));
        let d = IdentityKey::of(&parse_smiles("C[C@@H](N)C(=O)O").expect("valid smiles"));
        assert!(wedged == l || wedged == d);
        assert!(hashed == l || hashed == d);
    }

    #[test]
    fn splits_sd_records() {
        let sdf = format!("{ETHANOL}$$$$\n{ETHANOL}$$$$\n");
        let records: Vec<&str> = sdf_records(&sdf).collect();
        assert_eq!(records.len(), 2);
        assert!(records[1].starts_with("ethanol"));
    }
}
