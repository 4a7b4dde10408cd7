use chemsearch_index::MoleculeIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about one rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildStats {
    /// Structure files found in the archive
    pub files: usize,

    /// Files that parsed into a molecule
    pub valid: usize,

    /// Files that failed to parse
    pub invalid: usize,

    /// Identity keys shared by more than one file
    pub duplicated_keys: usize,

    /// Valid molecules per category
    pub categories: BTreeMap<String, usize>,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl RebuildStats {
    pub fn of_index(index: &MoleculeIndex, time_ms: u64) -> Self {
        let mut categories = BTreeMap::new();
        for record in index.molecules() {
            *categories.entry(record.category().to_string()).or_insert(0) += 1;
        }
        Self {
            files: index.len() + index.invalid().len(),
            valid: index.len(),
            invalid: index.invalid().len(),
            duplicated_keys: index.duplicates().duplicated_keys().count(),
            categories,
            time_ms,
        }
    }
}
