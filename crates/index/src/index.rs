use crate::duplicates::DuplicateTracker;
use crate::error::{IndexError, Result};
use crate::record::MoleculeRecord;
use chemsearch_chem::IdentityKey;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable snapshot of the archive: valid records in assembly order,
/// the duplicate grouping, and a key → representative lookup.
#[derive(Debug, Clone)]
pub struct MoleculeIndex {
    generation: u64,
    built_at: DateTime<Utc>,
    molecules: Vec<Arc<MoleculeRecord>>,
    invalid: Vec<Arc<MoleculeRecord>>,
    duplicates: DuplicateTracker,
    representatives: HashMap<IdentityKey, Arc<MoleculeRecord>>,
}

/// A molecule looked up by key, with the other records sharing that key.
#[derive(Debug, Clone, Copy)]
pub struct MoleculeLookup<'a> {
    pub record: &'a Arc<MoleculeRecord>,
    /// All records with this key when it is duplicated, otherwise empty.
    pub duplicates: &'a [Arc<MoleculeRecord>],
}

impl MoleculeLookup<'_> {
    pub fn is_duplicated(&self) -> bool {
        !self.duplicates.is_empty()
    }

    /// `DUPLICATES FOUND: <category - name>, ...` when the key is shared.
    pub fn duplicate_warning(&self) -> Option<String> {
        if !self.is_duplicated() {
            return None;
        }
        let names: Vec<String> = self
            .duplicates
            .iter()
            .map(|record| format!("<{} - {}>", record.category(), record.name()))
            .collect();
        Some(format!("DUPLICATES FOUND: {}", names.join(", ")))
    }
}

impl Default for MoleculeIndex {
    fn default() -> Self {
        Self::build(Vec::new())
    }
}

impl MoleculeIndex {
    /// Build from assembled records (newest first). Invalid records are kept
    /// aside for reporting; the first record seen for a key represents it.
    pub fn build(records: Vec<MoleculeRecord>) -> Self {
        let mut molecules = Vec::new();
        let mut invalid = Vec::new();
        for record in records {
            let record = Arc::new(record);
            if record.is_valid() {
                molecules.push(record);
            } else {
                invalid.push(record);
            }
        }

        let duplicates = DuplicateTracker::build(&molecules);
        let mut representatives: HashMap<IdentityKey, Arc<MoleculeRecord>> = HashMap::new();
        for record in &molecules {
            if let Some(key) = record.identity() {
                representatives
                    .entry(key.clone())
                    .or_insert_with(|| Arc::clone(record));
            }
        }

        let duplicated = duplicates.duplicated_keys().count();
        if duplicated > 0 {
            log::warn!("{duplicated} identity keys are shared by more than one file");
        }
        if !invalid.is_empty() {
            log::warn!("{} structure files could not be parsed", invalid.len());
        }

        Self {
            generation: 0,
            built_at: Utc::now(),
            molecules,
            invalid,
            duplicates,
            representatives,
        }
    }

    /// Publication counter; 0 until the index is published.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Valid records in assembly order.
    pub fn molecules(&self) -> &[Arc<MoleculeRecord>] {
        &self.molecules
    }

    /// Records whose structure failed to parse.
    pub fn invalid(&self) -> &[Arc<MoleculeRecord>] {
        &self.invalid
    }

    pub fn len(&self) -> usize {
        self.molecules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    pub fn duplicates(&self) -> &DuplicateTracker {
        &self.duplicates
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Arc<MoleculeRecord>> {
        self.representatives.get(key)
    }

    pub fn lookup(&self, key: &str) -> Result<MoleculeLookup<'_>> {
        let key = IdentityKey::from(key.to_string());
        let record = self
            .representatives
            .get(&key)
            .ok_or_else(|| IndexError::NotFound(key.to_string()))?;
        let duplicates = if self.duplicates.is_duplicated(&key) {
            self.duplicates.members(&key)
        } else {
            &[]
        };
        Ok(MoleculeLookup { record, duplicates })
    }
}
