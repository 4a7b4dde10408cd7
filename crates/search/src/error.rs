use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    QueryParse(#[from] chemsearch_chem::ChemError),

    #[error("Use SMILES rather than SMARTS for similarity search.")]
    PatternNotAllowed,

    #[error("Bad inputs: {0}")]
    BadInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
