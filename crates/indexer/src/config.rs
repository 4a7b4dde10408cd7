use crate::archive::{ArchiveSource, DirectoryListing, LocalArchive, MirroredArchive};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Where rebuilds read structure files from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// The archive directory itself.
    #[default]
    Local,
    /// A remote directory mirrored into the archive directory.
    Mirror {
        from: PathBuf,
        #[serde(default)]
        remove_stale: bool,
    },
}

/// Archive settings captured for each rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub source: SourceConfig,
    /// Category directories hold one directory per owning user.
    #[serde(default)]
    pub ownership: bool,
}

impl ArchiveConfig {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source: SourceConfig::Local,
            ownership: false,
        }
    }

    pub fn with_ownership(mut self, ownership: bool) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.source = source;
        self
    }

    /// Archive adapter for this configuration.
    pub fn open_source(&self) -> Arc<dyn ArchiveSource> {
        match &self.source {
            SourceConfig::Local => Arc::new(LocalArchive::new(self.root.clone(), self.ownership)),
            SourceConfig::Mirror { from, remove_stale } => Arc::new(
                MirroredArchive::new(
                    Arc::new(DirectoryListing::new(from.clone())),
                    self.root.clone(),
                    self.ownership,
                )
                .with_remove_stale(*remove_stale),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn source_kinds_deserialize() {
        let config: ArchiveConfig = serde_json::from_str(
            r#"{"root": "/srv/archive", "source": {"kind": "mirror", "from": "/mnt/drive"}, "ownership": true}"#,
        )
        .expect("config");
        assert_eq!(
            config.source,
            SourceConfig::Mirror {
                from: PathBuf::from("/mnt/drive"),
                remove_stale: false
            }
        );
        assert!(config.open_source().is_mirrored());

        let local: ArchiveConfig = serde_json::from_str(r#"{"root": "/srv/archive"}"#).expect("local");
        assert_eq!(local, ArchiveConfig::local("/srv/archive"));
        assert_eq!(local.open_source().location(), "local archive");
    }
}
