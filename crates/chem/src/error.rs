use thiserror::Error;

/// Result type for structure parsing and matching
pub type Result<T> = std::result::Result<T, ChemError>;

/// Errors raised while reading structures or queries
#[derive(Error, Debug)]
pub enum ChemError {
    /// Malformed MDL molfile
    #[error("Molfile error at line {line}: {message}")]
    Molfile { line: usize, message: String },

    /// Malformed SMILES string
    #[error("SMILES error at position {position}: {message}")]
    Smiles { position: usize, message: String },

    /// Malformed or unsupported SMARTS pattern
    #[error("SMARTS error at position {position}: {message}")]
    Smarts { position: usize, message: String },

    /// File extension does not map to a known structure format
    #[error("Unsupported structure format: {0}")]
    UnsupportedFormat(String),

    /// Structure contains no atoms
    #[error("Structure contains no atoms")]
    EmptyStructure,

    /// Bond references an atom that does not exist or links an atom to itself
    #[error("Invalid bond between atoms {from} and {to}")]
    InvalidBond { from: usize, to: usize },

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ChemError {
    pub fn molfile(line: usize, message: impl Into<String>) -> Self {
        Self::Molfile {
            line,
            message: message.into(),
        }
    }

    pub fn smiles(position: usize, message: impl Into<String>) -> Self {
        Self::Smiles {
            position,
            message: message.into(),
        }
    }

    pub fn smarts(position: usize, message: impl Into<String>) -> Self {
        Self::Smarts {
            position,
            message: message.into(),
        }
    }
}
