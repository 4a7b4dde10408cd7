//! # Chemsearch Search
//!
//! Query layer over a published [`chemsearch_index::MoleculeIndex`] snapshot.
//!
//! ```text
//! request (query, query_type, search_type, criteria)
//!     │
//!     ├──> validate (similarity takes SMILES only)
//!     ├──> FilterSet::apply (sort, allow-listed filters)
//!     ├──> matcher (substructure | similarity)
//!     ├──> count_filterable (facets over all matches)
//!     └──> page
//! ```

mod error;
mod filters;
mod matcher;
mod paging;
mod service;

pub use error::{Result, SearchError};
pub use filters::{Applied, Criteria, FacetCounts, FilterAttr, FilterSet, SortOrder};
pub use matcher::{similarity_match, substructure_match, SimilarityHit};
pub use paging::{page, page_count};
pub use service::{
    Hit, QueryType, ResultPage, SavedQuery, SearchRequest, SearchService, SearchType,
    DEFAULT_PER_PAGE,
};
