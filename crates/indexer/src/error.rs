use crate::job::{Completion, JobId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive source error: {0}")]
    Archive(String),

    #[error("Invalid archive path: {0}")]
    InvalidPath(String),

    #[error("Rebuild not found: {0}")]
    JobNotFound(String),

    #[error("Rebuild {id} already finalized ({completion})")]
    JobFinalized { id: JobId, completion: Completion },

    #[error("{0}")]
    Other(String),
}
