use anyhow::{bail, Context as AnyhowContext, Result};
use chemsearch_indexer::{ArchiveConfig, SourceConfig};
use chemsearch_search::{SavedQuery, DEFAULT_PER_PAGE};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const ARCHIVE_DIR_ENV: &str = "CHEMSEARCH_ARCHIVE_DIR";
pub const SOURCE_ENV: &str = "CHEMSEARCH_SOURCE";
pub const MIRROR_FROM_ENV: &str = "CHEMSEARCH_MIRROR_FROM";
pub const OWNERSHIP_ENV: &str = "CHEMSEARCH_OWNERSHIP";
pub const PER_PAGE_ENV: &str = "CHEMSEARCH_PER_PAGE";
pub const CONFIG_ENV: &str = "CHEMSEARCH_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    archive_dir: Option<PathBuf>,
    ownership: Option<bool>,
    per_page: Option<usize>,
    mirror: Option<MirrorSection>,
    queries: Vec<SavedQuery>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MirrorSection {
    from: PathBuf,
    #[serde(default)]
    remove_stale: bool,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut file: Self = toml::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        // Relative paths in the file are relative to the file.
        if let Some(base) = path.parent() {
            if let Some(dir) = file.archive_dir.as_mut() {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
            if let Some(mirror) = file.mirror.as_mut() {
                if mirror.from.is_relative() {
                    mirror.from = base.join(&mirror.from);
                }
            }
        }
        Ok(file)
    }
}

/// Command-line values that take precedence over environment and file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub archive_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Resolved settings: file, then environment, then command line.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub archive: ArchiveConfig,
    pub per_page: usize,
    pub queries: Vec<SavedQuery>,
}

impl AppConfig {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::load_with(overrides, |key| env::var(key).ok())
    }

    fn load_with(overrides: &Overrides, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = overrides
            .config
            .clone()
            .or_else(|| env(CONFIG_ENV).map(PathBuf::from));
        let file = match &config_path {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };

        let root = overrides
            .archive_dir
            .clone()
            .or_else(|| env(ARCHIVE_DIR_ENV).map(PathBuf::from))
            .or(file.archive_dir)
            .with_context(|| {
                format!("Archive directory not configured (use --archive or {ARCHIVE_DIR_ENV})")
            })?;

        let ownership = match env(OWNERSHIP_ENV) {
            Some(value) if env_truthy(&value) => true,
            Some(value) if env_falsey(&value) => false,
            Some(value) => bail!("{OWNERSHIP_ENV} must be true or false, got '{value}'"),
            None => file.ownership.unwrap_or(false),
        };

        let per_page = match env(PER_PAGE_ENV) {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{PER_PAGE_ENV} must be a number, got '{value}'"))?,
            None => file.per_page.unwrap_or(DEFAULT_PER_PAGE),
        };
        if per_page == 0 {
            bail!("Molecules per page must be positive");
        }

        let mirror_from = env(MIRROR_FROM_ENV).map(PathBuf::from);
        let source = match env(SOURCE_ENV).map(|value| value.trim().to_ascii_lowercase()) {
            Some(kind) if kind == "local" => SourceConfig::Local,
            Some(kind) if kind == "mirror" => mirror_source(mirror_from, file.mirror)?,
            Some(kind) => bail!("{SOURCE_ENV} must be 'local' or 'mirror', got '{kind}'"),
            None if mirror_from.is_some() || file.mirror.is_some() => {
                mirror_source(mirror_from, file.mirror)?
            }
            None => SourceConfig::Local,
        };

        Ok(Self {
            archive: ArchiveConfig {
                root,
                source,
                ownership,
            },
            per_page,
            queries: file.queries,
        })
    }

    pub fn query(&self, name: &str) -> Option<&SavedQuery> {
        self.queries.iter().find(|query| query.name == name)
    }
}

fn mirror_source(from: Option<PathBuf>, section: Option<MirrorSection>) -> Result<SourceConfig> {
    let remove_stale = section.as_ref().is_some_and(|mirror| mirror.remove_stale);
    let from = from
        .or(section.map(|mirror| mirror.from))
        .with_context(|| format!("Mirror source needs {MIRROR_FROM_ENV} or [mirror] from"))?;
    Ok(SourceConfig::Mirror { from, remove_stale })
}

fn env_truthy(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("on")
}

fn env_falsey(value: &str) -> bool {
    let value = value.trim();
    value == "0" || value.eq_ignore_ascii_case("false") || value.eq_ignore_ascii_case("off")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chemsearch_search::{QueryType, SearchType};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn environment_configures_a_local_archive() {
        let config = AppConfig::load_with(
            &Overrides::default(),
            env_of(&[(ARCHIVE_DIR_ENV, "/srv/archive"), (OWNERSHIP_ENV, "on")]),
        )
        .expect("config");
        assert_eq!(config.archive.root, PathBuf::from("/srv/archive"));
        assert_eq!(config.archive.source, SourceConfig::Local);
        assert!(config.archive.ownership);
        assert_eq!(config.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn command_line_beats_environment() {
        let overrides = Overrides {
            archive_dir: Some(PathBuf::from("/tmp/cli")),
            config: None,
        };
        let config =
            AppConfig::load_with(&overrides, env_of(&[(ARCHIVE_DIR_ENV, "/srv/archive")]))
                .expect("config");
        assert_eq!(config.archive.root, PathBuf::from("/tmp/cli"));
    }

    #[test]
    fn missing_archive_or_bad_values_are_errors() {
        assert!(AppConfig::load_with(&Overrides::default(), env_of(&[])).is_err());
        assert!(AppConfig::load_with(
            &Overrides::default(),
            env_of(&[(ARCHIVE_DIR_ENV, "/a"), (PER_PAGE_ENV, "0")])
        )
        .is_err());
        assert!(AppConfig::load_with(
            &Overrides::default(),
            env_of(&[(ARCHIVE_DIR_ENV, "/a"), (SOURCE_ENV, "mirror")])
        )
        .is_err());
        assert!(AppConfig::load_with(
            &Overrides::default(),
            env_of(&[(ARCHIVE_DIR_ENV, "/a"), (OWNERSHIP_ENV, "maybe")])
        )
        .is_err());
    }

    #[test]
    fn config_file_supplies_mirror_and_queries() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("chemsearch.toml");
        std::fs::write(
            &path,
            r#"
archive_dir = "archive"
per_page = 20

[mirror]
from = "/mnt/drive"
remove_stale = true

[[queries]]
name = "phenols"
query = "[OD1]c"
query_type = "smarts"
search_type = "substructure"

[[queries]]
name = "like-ethanol"
query = "CCO"
search_type = "similarity"
"#,
        )
        .expect("write config");

        let overrides = Overrides {
            archive_dir: None,
            config: Some(path),
        };
        let config = AppConfig::load_with(&overrides, env_of(&[(PER_PAGE_ENV, "5")])).expect("config");
        assert_eq!(config.archive.root, temp.path().join("archive"));
        assert_eq!(
            config.archive.source,
            SourceConfig::Mirror {
                from: PathBuf::from("/mnt/drive"),
                remove_stale: true
            }
        );
        assert_eq!(config.per_page, 5);
        assert_eq!(config.queries.len(), 2);

        let phenols = config.query("phenols").expect("saved query");
        assert_eq!(phenols.request.query_type, QueryType::Smarts);
        assert_eq!(phenols.request.search_type, SearchType::Substructure);
        let similar = config.query("like-ethanol").expect("saved query");
        assert_eq!(similar.request.query_type, QueryType::Smiles);
        assert!(config.query("missing").is_none());
    }
}
