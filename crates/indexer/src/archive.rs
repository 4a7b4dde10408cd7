use crate::error::{IndexerError, Result};
use crate::paths::is_hidden_name;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Local directory holding the archive after a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTree {
    pub root: PathBuf,
    /// Whether each category directory holds one directory per owner.
    pub ownership: bool,
}

/// Where structure files come from.
///
/// `sync` is idempotent and never deletes files that are still present at
/// the source.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Location shown in rebuild status messages.
    fn location(&self) -> String;

    /// True when `sync` copies files into a local mirror first.
    fn is_mirrored(&self) -> bool {
        false
    }

    async fn sync(&self) -> Result<ArchiveTree>;
}

/// An archive that already lives on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalArchive {
    root: PathBuf,
    ownership: bool,
}

impl LocalArchive {
    pub fn new(root: impl Into<PathBuf>, ownership: bool) -> Self {
        Self {
            root: root.into(),
            ownership,
        }
    }
}

#[async_trait]
impl ArchiveSource for LocalArchive {
    fn location(&self) -> String {
        "local archive".to_string()
    }

    async fn sync(&self) -> Result<ArchiveTree> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(ArchiveTree {
                root: self.root.clone(),
                ownership: self.ownership,
            }),
            Ok(_) => Err(IndexerError::Archive(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(err) => Err(IndexerError::Archive(format!(
                "cannot open {}: {err}",
                self.root.display()
            ))),
        }
    }
}

/// One file offered by a remote listing, addressed relative to its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub relative: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Read access to a remote archive.
#[async_trait]
pub trait RemoteListing: Send + Sync {
    fn location(&self) -> String;

    async fn list(&self) -> Result<Vec<RemoteEntry>>;

    async fn fetch(&self, entry: &RemoteEntry) -> Result<Vec<u8>>;
}

/// A listing over a directory such as a mounted network share.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    root: PathBuf,
}

impl DirectoryListing {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RemoteListing for DirectoryListing {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        let root = self.root.clone();
        if !tokio::fs::metadata(&root).await.is_ok_and(|meta| meta.is_dir()) {
            return Err(IndexerError::Archive(format!(
                "remote archive {} is not a directory",
                root.display()
            )));
        }
        tokio::task::spawn_blocking(move || {
            walk_files(&root)
                .into_iter()
                .filter_map(|(path, meta)| {
                    let relative = path.strip_prefix(&root).ok()?.to_path_buf();
                    Some(RemoteEntry {
                        relative,
                        size: meta.len(),
                        modified: meta.modified().unwrap_or(UNIX_EPOCH),
                    })
                })
                .collect()
        })
        .await
        .map_err(|err| IndexerError::Other(format!("listing task failed: {err}")))
    }

    async fn fetch(&self, entry: &RemoteEntry) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.root.join(&entry.relative)).await?)
    }
}

/// Counts from one mirror pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub copied: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Copies a remote listing into a local mirror directory.
pub struct MirroredArchive {
    listing: Arc<dyn RemoteListing>,
    root: PathBuf,
    ownership: bool,
    remove_stale: bool,
}

impl MirroredArchive {
    pub fn new(listing: Arc<dyn RemoteListing>, root: impl Into<PathBuf>, ownership: bool) -> Self {
        Self {
            listing,
            root: root.into(),
            ownership,
            remove_stale: false,
        }
    }

    /// Delete local files that the listing no longer offers.
    pub fn with_remove_stale(mut self, remove_stale: bool) -> Self {
        self.remove_stale = remove_stale;
        self
    }

    /// Bring the mirror up to date. Files whose size and mtime already match are left alone.
    pub async fn mirror(&self) -> Result<SyncReport> {
        let entries = self.listing.list().await?;
        tokio::fs::create_dir_all(&self.root).await?;

        let mut report = SyncReport::default();
        let mut offered: HashSet<PathBuf> = HashSet::new();
        for entry in &entries {
            if !is_safe_relative(&entry.relative) {
                log::warn!("Ignoring remote entry outside the archive: {}", entry.relative.display());
                continue;
            }
            let local = self.root.join(&entry.relative);
            offered.insert(local.clone());

            if is_current(&local, entry).await {
                report.unchanged += 1;
                continue;
            }
            let bytes = self.listing.fetch(entry).await?;
            if let Some(parent) = local.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&local, bytes).await?;
            let stamp = entry.modified;
            let target = local.clone();
            tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                std::fs::File::options()
                    .write(true)
                    .open(&target)?
                    .set_modified(stamp)
            })
            .await
            .map_err(|err| IndexerError::Other(format!("mirror task failed: {err}")))??;
            log::debug!("Mirrored {}", entry.relative.display());
            report.copied += 1;
        }

        if self.remove_stale {
            let root = self.root.clone();
            let stale: Vec<PathBuf> = tokio::task::spawn_blocking(move || {
                walk_files(&root)
                    .into_iter()
                    .map(|(path, _)| path)
                    .filter(|path| !offered.contains(path))
                    .collect()
            })
            .await
            .map_err(|err| IndexerError::Other(format!("mirror task failed: {err}")))?;
            for path in stale {
                tokio::fs::remove_file(&path).await?;
                log::debug!("Removed stale mirror file {}", path.display());
                report.removed += 1;
            }
        }

        log::info!(
            "Mirror of {} updated: {} copied, {} unchanged, {} removed",
            self.listing.location(),
            report.copied,
            report.unchanged,
            report.removed
        );
        Ok(report)
    }
}

#[async_trait]
impl ArchiveSource for MirroredArchive {
    fn location(&self) -> String {
        self.listing.location()
    }

    fn is_mirrored(&self) -> bool {
        true
    }

    async fn sync(&self) -> Result<ArchiveTree> {
        self.mirror().await?;
        Ok(ArchiveTree {
            root: self.root.clone(),
            ownership: self.ownership,
        })
    }
}

fn is_safe_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

async fn is_current(local: &Path, entry: &RemoteEntry) -> bool {
    let Ok(meta) = tokio::fs::metadata(local).await else {
        return false;
    };
    meta.len() == entry.size
        && meta.modified().is_ok_and(|modified| unix_secs(modified) == unix_secs(entry.modified))
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs())
        .unwrap_or(0)
}

/// Regular files below `root`, skipping hidden entries.
fn walk_files(root: &Path) -> Vec<(PathBuf, std::fs::Metadata)> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(is_hidden_name)
        })
        .filter_map(|result| match result {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Failed to read archive entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            Some((entry.into_path(), meta))
        })
        .collect()
}
