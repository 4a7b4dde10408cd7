use chemsearch_chem::{ChemError, IdentityKey, Structure};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a structure file sits in the archive, before it is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSource {
    pub path: PathBuf,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub modified: DateTime<Utc>,
}

impl RecordSource {
    /// Display name: the file stem.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One structure file of the archive. Immutable once assembled.
#[derive(Debug, Clone, Serialize)]
pub struct MoleculeRecord {
    name: String,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    modified: DateTime<Utc>,
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<IdentityKey>,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_error: Option<String>,
    #[serde(skip)]
    structure: Option<Arc<Structure>>,
}

impl MoleculeRecord {
    /// Record a parse outcome. Failures produce an invalid record rather than an error.
    pub fn from_parse(source: RecordSource, parsed: Result<Structure, ChemError>) -> Self {
        match parsed {
            Ok(structure) => Self::valid(source, structure),
            Err(err) => Self::invalid(source, err.to_string()),
        }
    }

    pub fn valid(source: RecordSource, structure: Structure) -> Self {
        let name = source.name();
        Self {
            name,
            category: source.category,
            owner: source.owner,
            modified: source.modified,
            path: source.path,
            identity: Some(structure.identity().clone()),
            valid: true,
            parse_error: None,
            structure: Some(Arc::new(structure)),
        }
    }

    pub fn invalid(source: RecordSource, error: impl Into<String>) -> Self {
        let name = source.name();
        Self {
            name,
            category: source.category,
            owner: source.owner,
            modified: source.modified,
            path: source.path,
            identity: None,
            valid: false,
            parse_error: Some(error.into()),
            structure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn identity(&self) -> Option<&IdentityKey> {
        self.identity.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn parse_error(&self) -> Option<&str> {
        self.parse_error.as_deref()
    }

    /// Parsed structure; `None` for invalid records.
    pub fn structure(&self) -> Option<&Structure> {
        self.structure.as_deref()
    }
}
