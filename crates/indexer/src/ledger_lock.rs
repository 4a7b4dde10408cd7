use crate::{IndexerError, Result};
use fs2::FileExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Exclusive advisory lock on the file next to a rebuild ledger.
///
/// Held while a ledger is re-read, merged and rewritten so that processes
/// sharing one archive never overwrite each other's job updates.
pub(crate) struct LedgerLock {
    #[allow(dead_code)]
    file: std::fs::File,
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// `rebuilds.json` is guarded by `rebuilds.lock`.
pub(crate) fn lock_path_for_ledger(ledger: &Path) -> PathBuf {
    ledger.with_extension("lock")
}

pub(crate) async fn acquire_ledger_lock(ledger: &Path) -> Result<LedgerLock> {
    let path = lock_path_for_ledger(ledger);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let lock = tokio::task::spawn_blocking(move || -> Result<LedgerLock> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                IndexerError::Other(format!("open ledger lock {}: {err}", path.display()))
            })?;

        let start = Instant::now();
        file.lock_exclusive().map_err(|err| {
            IndexerError::Other(format!("acquire ledger lock {}: {err}", path.display()))
        })?;
        let waited = start.elapsed();
        if waited.as_millis() > 100 {
            log::debug!("Waited {waited:?} for ledger lock {}", path.display());
        }

        Ok(LedgerLock { file })
    })
    .await
    .map_err(|err| IndexerError::Other(format!("join ledger lock task: {err}")))??;

    Ok(lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_sits_beside_the_ledger() {
        let path = Path::new("/srv/archive/.chemsearch/rebuilds.json");
        assert_eq!(
            lock_path_for_ledger(path),
            PathBuf::from("/srv/archive/.chemsearch/rebuilds.lock")
        );
    }

    #[tokio::test]
    async fn lock_is_released_on_drop() {
        let temp = TempDir::new().expect("tempdir");
        let ledger = temp.path().join(".chemsearch").join("rebuilds.json");

        let first = acquire_ledger_lock(&ledger).await.expect("first lock");
        drop(first);
        let _second = acquire_ledger_lock(&ledger).await.expect("second lock");
        assert!(lock_path_for_ledger(&ledger).exists());
    }
}
