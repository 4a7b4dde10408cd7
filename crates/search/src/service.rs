use crate::error::{Result, SearchError};
use crate::filters::{Criteria, FacetCounts, FilterAttr, FilterSet};
use crate::matcher::{similarity_match, substructure_match};
use crate::paging::{page, page_count};
use chemsearch_index::{MoleculeIndex, MoleculeRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default number of molecules per page.
pub const DEFAULT_PER_PAGE: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Smiles,
    Smarts,
}

impl QueryType {
    /// `smiles` (or empty) and `smarts`.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "smiles" => Ok(Self::Smiles),
            "smarts" => Ok(Self::Smarts),
            other => Err(SearchError::BadInput(format!("unknown query type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Similarity,
    Substructure,
}

impl SearchType {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" => Err(SearchError::BadInput("missing search type".to_string())),
            "similarity" => Ok(Self::Similarity),
            "substructure" => Ok(Self::Substructure),
            _ => Err(SearchError::NotFound("Unrecognized search type.".to_string())),
        }
    }
}

/// A search as submitted by a user or loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub query_type: QueryType,
    pub search_type: SearchType,
    #[serde(default)]
    pub criteria: Criteria,
}

impl SearchRequest {
    /// Build a request from raw strings, validating types before any matching.
    pub fn parse(query: &str, query_type: &str, search_type: &str, criteria: Criteria) -> Result<Self> {
        if query.trim().is_empty() {
            return Err(SearchError::BadInput("empty query".to_string()));
        }
        let request = Self {
            query: query.trim().to_string(),
            query_type: QueryType::parse(query_type)?,
            search_type: SearchType::parse(search_type)?,
            criteria,
        };
        request.validate()?;
        Ok(request)
    }

    /// Similarity search takes concrete structures only.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(SearchError::BadInput("empty query".to_string()));
        }
        if self.search_type == SearchType::Similarity && self.query_type == QueryType::Smarts {
            return Err(SearchError::PatternNotAllowed);
        }
        Ok(())
    }
}

/// A named query from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub name: String,
    #[serde(flatten)]
    pub request: SearchRequest,
}

/// One listed molecule, with its similarity score for similarity searches.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub record: Arc<MoleculeRecord>,
}

/// One page of a listing or search.
#[derive(Debug, Clone, Serialize)]
pub struct ResultPage {
    pub hits: Vec<Hit>,
    pub total: usize,
    pub page: usize,
    pub page_count: usize,
    pub sort: String,
    pub filters: Vec<(FilterAttr, String)>,
    /// Facet counts over every result, not just this page.
    pub filterable: FacetCounts,
}

/// Listing and search over a published index snapshot.
#[derive(Debug, Clone)]
pub struct SearchService {
    filters: FilterSet,
    per_page: usize,
}

impl SearchService {
    pub fn new(filters: FilterSet, per_page: usize) -> Self {
        Self {
            filters,
            per_page: per_page.max(1),
        }
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Browse the index with sort, filters and paging.
    pub fn browse(&self, index: &MoleculeIndex, criteria: &Criteria) -> Result<ResultPage> {
        let applied = self.filters.apply(index.molecules(), criteria);
        let filterable = self.filters.count_filterable(&applied.molecules);
        let hits: Vec<Hit> = applied
            .molecules
            .into_iter()
            .map(|record| Hit {
                score: None,
                record,
            })
            .collect();
        self.paginate(hits, criteria.page_number(), applied.sort, applied.filters, filterable)
    }

    /// Run a validated search within the request's filter and sort context.
    pub fn search(&self, index: &MoleculeIndex, request: &SearchRequest) -> Result<ResultPage> {
        request.validate()?;
        let applied = self.filters.apply(index.molecules(), &request.criteria);

        let hits: Vec<Hit> = match request.search_type {
            SearchType::Substructure => {
                let is_pattern = request.query_type == QueryType::Smarts;
                substructure_match(&request.query, &applied.molecules, is_pattern)?
                    .into_iter()
                    .map(|record| Hit {
                        score: None,
                        record,
                    })
                    .collect()
            }
            SearchType::Similarity => similarity_match(&request.query, &applied.molecules)?
                .into_iter()
                .map(|hit| Hit {
                    score: Some(hit.score),
                    record: hit.record,
                })
                .collect(),
        };
        log::info!(
            "{:?} search for '{}' matched {} of {} molecules",
            request.search_type,
            request.query,
            hits.len(),
            applied.molecules.len()
        );

        let matched: Vec<Arc<MoleculeRecord>> = hits.iter().map(|hit| Arc::clone(&hit.record)).collect();
        let filterable = self.filters.count_filterable(&matched);
        self.paginate(
            hits,
            request.criteria.page_number(),
            applied.sort,
            applied.filters,
            filterable,
        )
    }

    fn paginate(
        &self,
        hits: Vec<Hit>,
        page_number: usize,
        sort: String,
        filters: Vec<(FilterAttr, String)>,
        filterable: FacetCounts,
    ) -> Result<ResultPage> {
        let total = hits.len();
        let page_hits = page(&hits, page_number, self.per_page)?.to_vec();
        Ok(ResultPage {
            hits: page_hits,
            total,
            page: page_number,
            page_count: page_count(total, self.per_page),
            sort,
            filters,
            filterable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemsearch_chem::Structure;
    use chemsearch_index::RecordSource;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn index() -> MoleculeIndex {
        let rows = [
            ("aromatics", "toluene", "Cc1ccccc1"),
            ("aromatics", "phenol", "Oc1ccccc1"),
            ("alcohols", "ethanol", "CCO"),
            ("alcohols", "propanol", "CCCO"),
            ("aromatics", "cresol", "Cc1ccc(O)cc1"),
        ];
        let records = rows
            .iter()
            .enumerate()
            .map(|(idx, (category, name, smiles))| {
                let source = RecordSource {
                    path: PathBuf::from(format!("/archive/{category}/{name}.smi")),
                    category: category.to_string(),
                    owner: None,
                    modified: DateTime::from_timestamp(1000 - idx as i64, 0).expect("timestamp"),
                };
                MoleculeRecord::from_parse(source, Structure::from_smiles(smiles))
            })
            .collect();
        MoleculeIndex::build(records)
    }

    fn names(page: &ResultPage) -> Vec<&str> {
        page.hits.iter().map(|hit| hit.record.name()).collect()
    }

    #[test]
    fn pattern_similarity_is_rejected_before_matching() {
        let err = SearchRequest::parse("[OD1]", "smarts", "similarity", Criteria::default());
        assert!(matches!(err, Err(SearchError::PatternNotAllowed)));
    }

    #[test]
    fn request_validation() {
        assert!(matches!(
            SearchRequest::parse("  ", "smiles", "similarity", Criteria::default()),
            Err(SearchError::BadInput(_))
        ));
        assert!(matches!(
            SearchRequest::parse("CCO", "smiles", "", Criteria::default()),
            Err(SearchError::BadInput(_))
        ));
        assert!(matches!(
            SearchRequest::parse("CCO", "smiles", "exact", Criteria::default()),
            Err(SearchError::NotFound(_))
        ));
        assert!(matches!(
            SearchRequest::parse("CCO", "inchi", "similarity", Criteria::default()),
            Err(SearchError::BadInput(_))
        ));
        let ok = SearchRequest::parse("CCO", "", "substructure", Criteria::default()).expect("ok");
        assert_eq!(ok.query_type, QueryType::Smiles);
    }

    #[test]
    fn substructure_search_honours_filters_and_counts_all_matches() {
        let service = SearchService::new(FilterSet::for_archive(false), 2);
        let request = SearchRequest::parse("[OD1]", "smarts", "substructure", Criteria::default())
            .expect("request");

        let first = service.search(&index(), &request).expect("search");
        assert_eq!(first.total, 4);
        assert_eq!(first.page_count, 2);
        assert_eq!(names(&first), vec!["phenol", "ethanol"]);
        assert_eq!(first.filterable[&FilterAttr::Category]["aromatics"], 2);
        assert_eq!(first.filterable[&FilterAttr::Category]["alcohols"], 2);

        let mut filtered = request.clone();
        filtered.criteria = Criteria::from_args([("category", "alcohols"), ("sort", "alphabetical")]);
        let page = service.search(&index(), &filtered).expect("search");
        assert_eq!(names(&page), vec!["ethanol", "propanol"]);
        assert_eq!(page.sort, "alphabetical");
    }

    #[test]
    fn similarity_search_reports_scores() {
        let service = SearchService::new(FilterSet::for_archive(false), DEFAULT_PER_PAGE);
        let request = SearchRequest::parse("CCO", "smiles", "similarity", Criteria::default())
            .expect("request");
        let page = service.search(&index(), &request).expect("search");
        assert_eq!(page.hits[0].record.name(), "ethanol");
        assert_eq!(page.hits[0].score, Some(1.0));
        assert_eq!(page.total, 5);
    }

    #[test]
    fn browse_pages_out_of_range_are_not_found() {
        let service = SearchService::new(FilterSet::for_archive(false), 2);
        let last = service
            .browse(&index(), &Criteria::from_args([("page", "3")]))
            .expect("page 3");
        assert_eq!(names(&last), vec!["cresol"]);
        assert!(matches!(
            service.browse(&index(), &Criteria::from_args([("page", "4")])),
            Err(SearchError::NotFound(_))
        ));
    }

    #[test]
    fn saved_queries_deserialize_with_defaults() {
        let saved: SavedQuery = serde_json::from_str(
            r#"{"name": "phenols", "query": "[OD1]c", "query_type": "smarts", "search_type": "substructure"}"#,
        )
        .expect("saved query");
        assert_eq!(saved.request.query_type, QueryType::Smarts);
        assert!(saved.request.criteria.filters.is_empty());
    }
}
