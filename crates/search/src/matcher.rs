use crate::error::Result;
use chemsearch_chem::{Fingerprint, Query, Structure};
use chemsearch_index::MoleculeRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// A similarity search result.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityHit {
    pub score: f64,
    pub record: Arc<MoleculeRecord>,
}

/// Records containing `query`, in input order.
///
/// `query_is_pattern` selects SMARTS; otherwise the query is a SMILES structure.
/// Invalid records are skipped.
pub fn substructure_match(
    query: &str,
    mols: &[Arc<MoleculeRecord>],
    query_is_pattern: bool,
) -> Result<Vec<Arc<MoleculeRecord>>> {
    let query = if query_is_pattern {
        Query::pattern(query)?
    } else {
        Query::structure(query)?
    };
    let matches: Vec<Arc<MoleculeRecord>> = mols
        .iter()
        .filter(|record| {
            record
                .structure()
                .is_some_and(|structure| structure.contains(&query))
        })
        .cloned()
        .collect();
    log::debug!("Substructure search matched {} of {}", matches.len(), mols.len());
    Ok(matches)
}

/// Tanimoto similarity of every valid record to a SMILES `query`, best first.
/// Equal scores keep input order.
pub fn similarity_match(query: &str, mols: &[Arc<MoleculeRecord>]) -> Result<Vec<SimilarityHit>> {
    let query = Structure::from_smiles(query)?;
    Ok(rank_by_similarity(query.fingerprint(), mols))
}

fn rank_by_similarity(query: &Fingerprint, mols: &[Arc<MoleculeRecord>]) -> Vec<SimilarityHit> {
    let mut hits: Vec<SimilarityHit> = mols
        .iter()
        .filter_map(|record| {
            let structure = record.structure()?;
            Some(SimilarityHit {
                score: structure.similarity(query),
                record: Arc::clone(record),
            })
        })
        .collect();
    // Stable sort: ties stay in input order.
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits
}
