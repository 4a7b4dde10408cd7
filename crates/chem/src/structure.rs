use crate::canonical::IdentityKey;
use crate::error::{ChemError, Result};
use crate::fingerprint::Fingerprint;
use crate::mol::Molecule;
use crate::molfile::{parse_molfile, sdf_records, write_molfile};
use crate::smarts::QueryMol;
use crate::smiles::parse_smiles;
use crate::substruct::has_substructure;
use std::path::Path;

/// File extensions read by [`Structure::read`].
pub const STRUCTURE_EXTENSIONS: &[&str] = &["mol", "mdl", "sdf", "smi"];

/// A parsed structure with everything search needs precomputed.
#[derive(Debug, Clone)]
pub struct Structure {
    molecule: Molecule,
    identity: IdentityKey,
    fingerprint: Fingerprint,
    mol_block: String,
}

impl Structure {
    fn new(molecule: Molecule, mol_block: String) -> Self {
        let identity = IdentityKey::of(&molecule);
        let fingerprint = Fingerprint::of(&molecule);
        Self {
            molecule,
            identity,
            fingerprint,
            mol_block,
        }
    }

    /// Parse a mol block, keeping its text (up to `M  END`) for export.
    pub fn from_mol_block(text: &str) -> Result<Self> {
        let molecule = parse_molfile(text)?;
        let mut block = String::new();
        for line in text.lines() {
            block.push_str(line.trim_end_matches('\r'));
            block.push('\n');
            if line.starts_with("M  END") {
                break;
            }
        }
        Ok(Self::new(molecule, block))
    }

    pub fn from_smiles(text: &str) -> Result<Self> {
        let molecule = parse_smiles(text)?;
        let mol_block = write_molfile(&molecule);
        Ok(Self::new(molecule, mol_block))
    }

    /// Read a structure file, choosing the format from its extension.
    ///
    /// SD files contribute their first record; `.smi` files their first token.
    pub fn read(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let text = std::fs::read_to_string(path)?;

        let mut structure = match extension.as_str() {
            "mol" | "mdl" => Self::from_mol_block(&text)?,
            "sdf" => {
                let first = sdf_records(&text).next().ok_or(ChemError::EmptyStructure)?;
                Self::from_mol_block(first)?
            }
            "smi" => {
                let smiles = text
                    .split_whitespace()
                    .next()
                    .ok_or(ChemError::EmptyStructure)?;
                Self::from_smiles(smiles)?
            }
            other => return Err(ChemError::UnsupportedFormat(other.to_string())),
        };

        if structure.molecule.name.trim().is_empty() || extension == "smi" {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                structure.molecule.name = stem.to_string();
            }
        }
        log::debug!(
            "Parsed {} ({} atoms, key {})",
            path.display(),
            structure.molecule.atom_count(),
            structure.identity
        );
        Ok(structure)
    }

    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    pub fn identity(&self) -> &IdentityKey {
        &self.identity
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// V2000 mol block ending with `M  END` and a newline.
    pub fn mol_block(&self) -> &str {
        &self.mol_block
    }

    /// Substructure test with a fingerprint screen for exact-structure queries.
    pub fn contains(&self, query: &Query) -> bool {
        if let Some(screen) = &query.screen {
            if !self.fingerprint.contains(screen) {
                return false;
            }
        }
        has_substructure(&query.graph, &self.molecule)
    }

    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        self.fingerprint.tanimoto(other)
    }
}

/// A parsed substructure query.
#[derive(Debug, Clone)]
pub struct Query {
    graph: QueryMol,
    screen: Option<Fingerprint>,
}

impl Query {
    /// Concrete structure (SMILES); matches only exact atoms and bond orders.
    pub fn structure(text: &str) -> Result<Self> {
        let molecule = parse_smiles(text)?;
        Ok(Self {
            graph: QueryMol::from_molecule(&molecule),
            screen: Some(Fingerprint::of(&molecule)),
        })
    }

    /// SMARTS pattern.
    pub fn pattern(text: &str) -> Result<Self> {
        Ok(Self {
            graph: crate::smarts::parse_smarts(text)?,
            screen: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn reads_smi_files_by_stem() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("phenol.smi");
        std::fs::write(&path, "Oc1ccccc1 phenol\n").expect("write structure file");

        let structure = Structure::read(&path).expect("readable structure");
        assert_eq!(structure.molecule().name, "phenol");
        assert_eq!(structure.molecule().atom_count(), 7);
        assert!(structure.mol_block().ends_with("M  END\n"));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "CCO").expect("write structure file");
        assert!(matches!(
            Structure::read(&path),
            Err(ChemError::UnsupportedFormat(ext)) if ext == "txt"
        ));
    }

    #[test]
    fn kekule_and_aromatic_spellings_share_identity() {
        let a = Structure::from_smiles("C1=CC=CC=C1O").expect("valid smiles");
        let b = Structure::from_smiles("Oc1ccccc1").expect("valid smiles");
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.similarity(b.fingerprint()), 1.0);
    }

    #[test]
    fn mol_block_round_trips_through_smiles_writer() {
        let smiles = Structure::from_smiles("CC(=O)[O-]").expect("valid smiles");
        let reread = Structure::from_mol_block(smiles.mol_block()).expect("valid mol block");
        assert_eq!(smiles.identity(), reread.identity());
    }

    #[test]
    fn structure_query_screens_by_fingerprint() {
        let target = Structure::from_smiles("Oc1ccc(CC)cc1").expect("valid smiles");
        assert!(target.contains(&Query::structure("c1ccccc1O").expect("valid query")));
        assert!(!target.contains(&Query::structure("c1ccccc1N").expect("valid query")));
        assert!(target.contains(&Query::pattern("[OD1]c").expect("valid pattern")));
    }
}
