use crate::paths::is_hidden_name;
use chemsearch_chem::STRUCTURE_EXTENSIONS;
use chemsearch_index::RecordSource;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Scanner for structure files laid out as `<category>/[<owner>/]…/<name>.<ext>`.
pub struct ArchiveScanner {
    root: PathBuf,
    ownership: bool,
}

impl ArchiveScanner {
    pub fn new(root: impl AsRef<Path>, ownership: bool) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ownership,
        }
    }

    /// Walk the archive in file-name order. Hidden entries are skipped.
    pub fn scan(&self) -> Vec<RecordSource> {
        let mut sources = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(is_hidden_name)
            });

        for result in walker {
            match result {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = entry.path();
                    if !Self::is_structure_file(path) {
                        continue;
                    }
                    let Some((category, owner)) = self.classify(path) else {
                        log::debug!("Skipping uncategorised file {}", path.display());
                        continue;
                    };
                    let modified = entry
                        .metadata()
                        .ok()
                        .and_then(|meta| meta.modified().ok())
                        .unwrap_or(UNIX_EPOCH);
                    sources.push(RecordSource {
                        path: path.to_path_buf(),
                        category,
                        owner,
                        modified: DateTime::<Utc>::from(modified),
                    });
                }
                Err(e) => log::warn!("Failed to read archive entry: {e}"),
            }
        }

        log::info!(
            "Found {} structure files in {}",
            sources.len(),
            self.root.display()
        );
        sources
    }

    fn is_structure_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                STRUCTURE_EXTENSIONS
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(ext))
            })
    }

    /// Category is the first directory; the owner is the second when the
    /// archive carries ownership and the file sits below it.
    fn classify(&self, path: &Path) -> Option<(String, Option<String>)> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let dirs: Vec<String> = relative
            .parent()?
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let category = dirs.first()?.clone();
        let owner = if self.ownership {
            dirs.get(1).cloned()
        } else {
            None
        };
        Some((category, owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "CCO\n").expect("write");
    }

    fn summary(sources: &[RecordSource], root: &Path) -> Vec<(String, String, Option<String>)> {
        sources
            .iter()
            .map(|source| {
                (
                    source
                        .path
                        .strip_prefix(root)
                        .expect("under root")
                        .to_string_lossy()
                        .replace('\\', "/"),
                    source.category.clone(),
                    source.owner.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn scan_groups_by_category_and_skips_noise() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        touch(root, "solvents/ethanol.smi");
        touch(root, "solvents/acetone/acetone.mol");
        touch(root, "solvents/notes.txt");
        touch(root, "loose.mol");
        touch(root, ".chemsearch/cache.mol");
        touch(root, "acids/.hidden.mol");
        touch(root, "acids/acetic.MOL");

        let sources = ArchiveScanner::new(root, false).scan();
        assert_eq!(
            summary(&sources, root),
            vec![
                ("acids/acetic.MOL".to_string(), "acids".to_string(), None),
                ("solvents/acetone/acetone.mol".to_string(), "solvents".to_string(), None),
                ("solvents/ethanol.smi".to_string(), "solvents".to_string(), None),
            ]
        );
    }

    #[test]
    fn scan_reads_owner_directories_when_enabled() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        touch(root, "solvents/alice/ethanol/ethanol.mol");
        touch(root, "solvents/methanol.smi");

        let sources = ArchiveScanner::new(root, true).scan();
        assert_eq!(
            summary(&sources, root),
            vec![
                (
                    "solvents/alice/ethanol/ethanol.mol".to_string(),
                    "solvents".to_string(),
                    Some("alice".to_string())
                ),
                ("solvents/methanol.smi".to_string(), "solvents".to_string(), None),
            ]
        );
    }
}
