use crate::archive::ArchiveTree;
use crate::error::{IndexerError, Result};
use crate::job::JobId;
use crate::paths::manifest_path;
use crate::scanner::ArchiveScanner;
use chemsearch_chem::Structure;
use chemsearch_index::{MoleculeRecord, RecordSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Structure files of the tree, newest modification first, ties by path.
pub async fn assemble(tree: &ArchiveTree) -> Result<Vec<RecordSource>> {
    let root = tree.root.clone();
    let ownership = tree.ownership;
    let mut sources = tokio::task::spawn_blocking(move || ArchiveScanner::new(root, ownership).scan())
        .await
        .map_err(|err| IndexerError::Other(format!("scan task failed: {err}")))?;
    sources.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(sources)
}

/// Parse every source into a record. Parse failures become invalid records.
pub async fn parse_records(sources: Vec<RecordSource>) -> Result<Vec<MoleculeRecord>> {
    tokio::task::spawn_blocking(move || {
        sources
            .into_iter()
            .map(|source| {
                let parsed = Structure::read(&source.path);
                if let Err(err) = &parsed {
                    log::warn!("Failed to parse {}: {err}", source.path.display());
                }
                MoleculeRecord::from_parse(source, parsed)
            })
            .collect()
    })
    .await
    .map_err(|err| IndexerError::Other(format!("parse task failed: {err}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the archive root.
    pub path: PathBuf,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Assembled metadata of one rebuild, in assembly order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub job: JobId,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(job: JobId, archive_root: &Path, records: &[MoleculeRecord]) -> Self {
        let entries = records
            .iter()
            .map(|record| ManifestEntry {
                path: record
                    .path()
                    .strip_prefix(archive_root)
                    .unwrap_or(record.path())
                    .to_path_buf(),
                name: record.name().to_string(),
                category: record.category().to_string(),
                owner: record.owner().map(str::to_string),
                modified: record.modified(),
                key: record.identity().map(|key| key.as_str().to_string()),
                valid: record.is_valid(),
                error: record.parse_error().map(str::to_string),
            })
            .collect();
        Self {
            job,
            generated_at: Utc::now(),
            entries,
        }
    }

    pub async fn write(&self, archive_root: &Path) -> Result<PathBuf> {
        let path = manifest_path(archive_root);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::debug!("Wrote manifest with {} entries to {}", self.entries.len(), path.display());
        Ok(path)
    }

    /// Sources listed by this manifest, resolved against `archive_root`, in manifest order.
    pub fn sources(&self, archive_root: &Path) -> Vec<RecordSource> {
        self.entries
            .iter()
            .map(|entry| RecordSource {
                path: archive_root.join(&entry.path),
                category: entry.category.clone(),
                owner: entry.owner.clone(),
                modified: entry.modified,
            })
            .collect()
    }

    /// Manifest of the last rebuild, if one was written.
    pub async fn read(archive_root: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(manifest_path(archive_root)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
