use crate::record::MoleculeRecord;
use chemsearch_chem::IdentityKey;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Groups valid records by identity key. Built once per index, never mutated.
#[derive(Debug, Clone, Default)]
pub struct DuplicateTracker {
    groups: BTreeMap<IdentityKey, Vec<Arc<MoleculeRecord>>>,
    duplicated: BTreeSet<IdentityKey>,
}

impl DuplicateTracker {
    /// Group records in the given order; records without an identity are skipped.
    pub fn build<'a>(records: impl IntoIterator<Item = &'a Arc<MoleculeRecord>>) -> Self {
        let mut groups: BTreeMap<IdentityKey, Vec<Arc<MoleculeRecord>>> = BTreeMap::new();
        for record in records {
            if let Some(key) = record.identity() {
                groups.entry(key.clone()).or_default().push(Arc::clone(record));
            }
        }
        let duplicated = groups
            .iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(key, _)| key.clone())
            .collect();
        Self { groups, duplicated }
    }

    pub fn is_duplicated(&self, key: &IdentityKey) -> bool {
        self.duplicated.contains(key)
    }

    /// Records sharing `key`, in assembly order. Empty for unknown keys.
    pub fn members(&self, key: &IdentityKey) -> &[Arc<MoleculeRecord>] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys held by more than one record, ascending.
    pub fn duplicated_keys(&self) -> impl Iterator<Item = &IdentityKey> + '_ {
        self.duplicated.iter()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&IdentityKey, &[Arc<MoleculeRecord>])> + '_ {
        self.groups.iter().map(|(key, members)| (key, members.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSource;
    use chemsearch_chem::Structure;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn record(name: &str, smiles: &str) -> Arc<MoleculeRecord> {
        let source = RecordSource {
            path: PathBuf::from(format!("/archive/misc/{name}.smi")),
            category: "misc".to_string(),
            owner: None,
            modified: DateTime::from_timestamp(0, 0).expect("epoch"),
        };
        Arc::new(MoleculeRecord::from_parse(source, Structure::from_smiles(smiles)))
    }

    #[test]
    fn three_spellings_of_one_compound_form_a_group() {
        let records = vec![
            record("benzene_a", "c1ccccc1"),
            record("benzene_b", "C1=CC=CC=C1"),
            record("benzene_c", "C1C=CC=CC=1"),
            record("toluene", "Cc1ccccc1"),
        ];
        let tracker = DuplicateTracker::build(&records);
        let key = records[0].identity().expect("key").clone();

        assert!(tracker.is_duplicated(&key));
        let names: Vec<&str> = tracker.members(&key).iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["benzene_a", "benzene_b", "benzene_c"]);

        let toluene = records[3].identity().expect("key");
        assert!(!tracker.is_duplicated(toluene));
        assert_eq!(tracker.members(toluene).len(), 1);
        assert_eq!(tracker.duplicated_keys().count(), 1);
    }

    #[test]
    fn invalid_records_are_not_grouped() {
        let records = vec![record("bad", "C1CC"), record("ok", "CCO")];
        let tracker = DuplicateTracker::build(&records);
        assert_eq!(tracker.group_count(), 1);
    }
}
