use crate::job::JobId;
use std::path::{Path, PathBuf};

/// Directory under the archive root holding rebuild state.
pub const STATE_DIR_NAME: &str = ".chemsearch";

const LEDGER_FILE_NAME: &str = "rebuilds.json";
const MANIFEST_FILE_NAME: &str = "manifest.json";

#[must_use]
pub fn state_dir(archive_root: &Path) -> PathBuf {
    archive_root.join(STATE_DIR_NAME)
}

#[must_use]
pub fn ledger_path(archive_root: &Path) -> PathBuf {
    state_dir(archive_root).join(LEDGER_FILE_NAME)
}

#[must_use]
pub fn manifest_path(archive_root: &Path) -> PathBuf {
    state_dir(archive_root).join(MANIFEST_FILE_NAME)
}

#[must_use]
pub fn rebuild_log_path(archive_root: &Path, job: JobId) -> PathBuf {
    state_dir(archive_root).join(format!("rebuild_{job}.log"))
}

/// Dot-prefixed entries, the state directory included, are not archive content.
pub(crate) fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}
