use crate::index::MoleculeIndex;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared owner of the published index.
///
/// Readers take an `Arc` snapshot and keep it for the whole request;
/// publishing swaps the reference and never touches a snapshot in flight.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    sender: Arc<watch::Sender<Arc<MoleculeIndex>>>,
}

impl Default for IndexHandle {
    fn default() -> Self {
        Self::new(MoleculeIndex::default())
    }
}

impl IndexHandle {
    pub fn new(initial: MoleculeIndex) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Snapshot of the index current at the time of the call.
    pub fn current(&self) -> Arc<MoleculeIndex> {
        Arc::clone(&self.sender.borrow())
    }

    /// Replace the current index, stamping it with the next generation.
    pub fn publish(&self, mut index: MoleculeIndex) -> Arc<MoleculeIndex> {
        let mut published = None;
        self.sender.send_modify(|current| {
            index.set_generation(current.generation() + 1);
            let next = Arc::new(index);
            published = Some(Arc::clone(&next));
            *current = next;
        });
        let published = published.unwrap_or_else(|| self.current());
        log::info!(
            "Published molecule index generation {} ({} molecules, {} invalid)",
            published.generation(),
            published.len(),
            published.invalid().len()
        );
        published
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MoleculeIndex>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MoleculeRecord, RecordSource};
    use chemsearch_chem::Structure;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn index_of(smiles: &[&str]) -> MoleculeIndex {
        let records = smiles
            .iter()
            .enumerate()
            .map(|(idx, smiles)| {
                let source = RecordSource {
                    path: PathBuf::from(format!("/archive/misc/m{idx}.smi")),
                    category: "misc".to_string(),
                    owner: None,
                    modified: DateTime::from_timestamp(0, 0).expect("epoch"),
                };
                MoleculeRecord::from_parse(source, Structure::from_smiles(smiles))
            })
            .collect();
        MoleculeIndex::build(records)
    }

    #[test]
    fn snapshots_survive_publication() {
        let handle = IndexHandle::default();
        assert_eq!(handle.current().generation(), 0);

        handle.publish(index_of(&["CCO", "CCN"]));
        let before = handle.current();

        let after = handle.publish(index_of(&["CCO"]));
        assert_eq!(before.generation(), 1);
        assert_eq!(before.len(), 2);
        assert_eq!(after.generation(), 2);
        assert_eq!(handle.current().len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_new_generations() {
        let handle = IndexHandle::default();
        let mut rx = handle.subscribe();
        handle.publish(index_of(&["CCO"]));
        rx.changed().await.expect("changed");
        assert_eq!(rx.borrow().generation(), 1);
    }
}
