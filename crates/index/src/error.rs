use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Molecule not found: {0}")]
    NotFound(String),

    #[error("No valid molecules available for export")]
    NothingToExport,
}
