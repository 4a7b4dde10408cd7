use crate::error::{IndexError, Result};
use crate::index::MoleculeIndex;
use chrono::{DateTime, Utc};

/// Concatenate the mol blocks of every valid molecule, in index order, as an SD file.
pub fn export_sdf(index: &MoleculeIndex) -> Result<String> {
    if index.is_empty() {
        return Err(IndexError::NothingToExport);
    }
    let mut out = String::new();
    for record in index.molecules() {
        if let Some(structure) = record.structure() {
            out.push_str(structure.mol_block());
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("$$$$\n");
        }
    }
    log::debug!("Exported {} molecules", index.len());
    Ok(out)
}

/// `export_{YYYY-MM-DD}.sdf`
pub fn export_filename(date: DateTime<Utc>) -> String {
    format!("export_{}.sdf", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MoleculeRecord, RecordSource};
    use chemsearch_chem::{sdf_records, Structure};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn record(name: &str, smiles: &str) -> MoleculeRecord {
        let source = RecordSource {
            path: PathBuf::from(format!("/archive/misc/{name}.smi")),
            category: "misc".to_string(),
            owner: None,
            modified: DateTime::from_timestamp(0, 0).expect("epoch"),
        };
        MoleculeRecord::from_parse(source, Structure::from_smiles(smiles))
    }

    #[test]
    fn bundles_only_valid_molecules_in_order() {
        let index = MoleculeIndex::build(vec![
            record("first", "CCO"),
            record("broken", "C1CC"),
            record("second", "c1ccccc1"),
        ]);
        let sdf = export_sdf(&index).expect("export");
        let blocks: Vec<Structure> = sdf_records(&sdf)
            .map(|block| Structure::from_mol_block(block).expect("block"))
            .collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(Some(blocks[0].identity()), index.molecules()[0].identity());
        assert_eq!(Some(blocks[1].identity()), index.molecules()[1].identity());
    }

    #[test]
    fn empty_index_has_nothing_to_export() {
        let index = MoleculeIndex::build(vec![record("broken", "C1CC")]);
        assert!(matches!(export_sdf(&index), Err(IndexError::NothingToExport)));
    }

    #[test]
    fn filename_carries_the_date() {
        let date = DateTime::from_timestamp(1_700_000_000, 0).expect("date");
        assert_eq!(export_filename(date), "export_2023-11-14.sdf");
    }
}
