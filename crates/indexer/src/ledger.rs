use crate::error::{IndexerError, Result};
use crate::job::{Completion, JobId, RebuildJob};
use crate::ledger_lock::acquire_ledger_lock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const LEDGER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    schema_version: u32,
    jobs: Vec<RebuildJob>,
}

/// Progress summary shown to users while a rebuild runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub status: String,
    pub is_complete: bool,
}

/// Every rebuild job ever created, in creation order.
///
/// Mutations happen in memory under a lock; [`JobLedger::save`] merges them
/// into the JSON file when the ledger was opened from one.
#[derive(Debug, Clone, Default)]
pub struct JobLedger {
    jobs: Arc<Mutex<Vec<RebuildJob>>>,
    path: Option<PathBuf>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl JobLedger {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the ledger at `path`, or start an empty one bound to it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let jobs = read_jobs(&path).await?.unwrap_or_default();
        log::debug!("Loaded {} rebuild jobs from {}", jobs.len(), path.display());
        Ok(Self {
            jobs: Arc::new(Mutex::new(jobs)),
            path: Some(path),
            write_lock: Arc::default(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist the ledger.
    ///
    /// Under the file lock the ledger on disk is re-read and merged by job id,
    /// so jobs finished or cleared by another process stay that way. The
    /// merged list replaces the in-memory one.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let _file_lock = acquire_ledger_lock(path).await?;

        let on_disk = read_jobs(path).await?.unwrap_or_default();
        let merged = merge_jobs(on_disk, &self.lock());
        let file = LedgerFile {
            schema_version: LEDGER_SCHEMA_VERSION,
            jobs: merged,
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        *self.lock() = file.jobs;
        Ok(())
    }

    pub fn create(&self, initiated_by: Option<String>) -> RebuildJob {
        let job = RebuildJob::create(initiated_by);
        self.lock().push(job.clone());
        log::info!("Created rebuild {}", job.id());
        job
    }

    pub fn append_status(&self, id: JobId, message: impl Into<String>) -> Result<()> {
        self.with_job(id, |job| job.append_status(message))
    }

    pub fn mark_succeeded(&self, id: JobId) -> Result<()> {
        self.with_job(id, RebuildJob::mark_succeeded)
    }

    pub fn mark_cleared(&self, id: JobId) -> Result<()> {
        self.with_job(id, RebuildJob::mark_cleared)
    }

    pub fn get(&self, id: JobId) -> Result<RebuildJob> {
        self.lock()
            .iter()
            .find(|job| job.id() == id)
            .cloned()
            .ok_or_else(|| IndexerError::JobNotFound(id.to_string()))
    }

    /// Latest-started pending job.
    pub fn most_recent_pending(&self) -> Option<RebuildJob> {
        self.lock()
            .iter()
            .filter(|job| job.is_pending())
            .max_by_key(|job| job.started_at())
            .cloned()
    }

    /// Succeeded job with the latest end timestamp.
    pub fn most_recent_complete(&self) -> Option<RebuildJob> {
        self.lock()
            .iter()
            .filter(|job| job.completion() == Completion::Succeeded)
            .max_by_key(|job| job.ended_at())
            .cloned()
    }

    /// Pending jobs, oldest start first.
    pub fn pending(&self) -> Vec<RebuildJob> {
        let mut pending: Vec<RebuildJob> = self
            .lock()
            .iter()
            .filter(|job| job.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|job| job.started_at());
        pending
    }

    /// Force every pending job to `Cleared`, returning the cleared ids in start order.
    pub fn clear_pending(&self) -> Vec<JobId> {
        let mut jobs = self.lock();
        let mut cleared: Vec<(chrono::DateTime<chrono::Utc>, JobId)> = Vec::new();
        for job in jobs.iter_mut().filter(|job| job.is_pending()) {
            if job.mark_cleared().is_ok() {
                cleared.push((job.started_at(), job.id()));
            }
        }
        cleared.sort_by_key(|(started, _)| *started);
        if !cleared.is_empty() {
            log::info!("Cleared {} pending rebuilds", cleared.len());
        }
        cleared.into_iter().map(|(_, id)| id).collect()
    }

    /// All jobs, newest start first.
    pub fn history(&self) -> Vec<RebuildJob> {
        let mut jobs = self.lock().clone();
        jobs.reverse();
        jobs.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
        jobs
    }

    /// Most recent pending job if any, else most recent complete job.
    pub fn build_status(&self) -> BuildStatus {
        if let Some(job) = self.most_recent_pending() {
            return BuildStatus {
                status: job.progress_message().to_string(),
                is_complete: false,
            };
        }
        match self.most_recent_complete() {
            Some(job) => BuildStatus {
                status: job.progress_message().to_string(),
                is_complete: true,
            },
            None => BuildStatus {
                status: String::new(),
                is_complete: true,
            },
        }
    }

    fn with_job<T>(&self, id: JobId, f: impl FnOnce(&mut RebuildJob) -> Result<T>) -> Result<T> {
        let mut jobs = self.lock();
        let job = jobs
            .iter_mut()
            .find(|job| job.id() == id)
            .ok_or_else(|| IndexerError::JobNotFound(id.to_string()))?;
        f(job)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RebuildJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn read_jobs(path: &Path) -> Result<Option<Vec<RebuildJob>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let file: LedgerFile = serde_json::from_slice(&bytes)?;
            if file.schema_version != LEDGER_SCHEMA_VERSION {
                log::warn!(
                    "Rebuild ledger {} has schema version {} (expected {LEDGER_SCHEMA_VERSION})",
                    path.display(),
                    file.schema_version
                );
            }
            Ok(Some(file.jobs))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Combine the ledger on disk with this process's view, keyed by job id.
///
/// A finished job never reverts to pending: a terminal state on either side
/// wins, and when both sides are terminal the disk copy is kept. Between two
/// pending copies the one with the longer status log wins. Jobs only on disk
/// keep their place; jobs only in memory are appended.
fn merge_jobs(on_disk: Vec<RebuildJob>, in_memory: &[RebuildJob]) -> Vec<RebuildJob> {
    let mut merged = on_disk;
    for job in in_memory {
        match merged.iter_mut().find(|existing| existing.id() == job.id()) {
            Some(existing) => {
                let replace = match (existing.is_pending(), job.is_pending()) {
                    (true, false) => true,
                    (true, true) => job.statuses().len() > existing.statuses().len(),
                    (false, _) => false,
                };
                if replace {
                    *existing = job.clone();
                }
            }
            None => merged.push(job.clone()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn empty_ledger_reports_complete_with_no_status() {
        let ledger = JobLedger::in_memory();
        assert_eq!(
            ledger.build_status(),
            BuildStatus {
                status: String::new(),
                is_complete: true
            }
        );
        assert!(ledger.most_recent_pending().is_none());
        assert!(ledger.most_recent_complete().is_none());
    }

    #[test]
    fn status_prefers_pending_jobs() {
        let ledger = JobLedger::in_memory();
        let done = ledger.create(None).id();
        ledger.append_status(done, "Completed rebuild contains 3 molecules.").expect("append");
        ledger.mark_succeeded(done).expect("succeed");
        assert_eq!(
            ledger.build_status(),
            BuildStatus {
                status: "Completed rebuild contains 3 molecules.".to_string(),
                is_complete: true
            }
        );

        let running = ledger.create(Some("bob".to_string())).id();
        ledger.append_status(running, "Generating metadata.").expect("append");
        assert_eq!(
            ledger.build_status(),
            BuildStatus {
                status: "Generating metadata.".to_string(),
                is_complete: false
            }
        );
    }

    #[test]
    fn clearing_two_pending_jobs() {
        let ledger = JobLedger::in_memory();
        let first = ledger.create(None).id();
        let second = ledger.create(None).id();
        assert_eq!(
            ledger.pending().iter().map(RebuildJob::id).collect::<Vec<_>>(),
            vec![first, second]
        );

        assert_eq!(ledger.clear_pending(), vec![first, second]);
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.get(first).expect("first").completion(), Completion::Cleared);
        assert_eq!(ledger.get(second).expect("second").completion(), Completion::Cleared);
        assert_eq!(ledger.history().len(), 2);
        assert!(ledger.most_recent_complete().is_none());
    }

    #[test]
    fn unknown_jobs_are_not_found() {
        let ledger = JobLedger::in_memory();
        let stranger = JobId::new();
        assert!(matches!(ledger.get(stranger), Err(IndexerError::JobNotFound(_))));
        assert!(matches!(
            ledger.append_status(stranger, "x"),
            Err(IndexerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn ledger_survives_reopen() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join(".chemsearch").join("rebuilds.json");

        let ledger = JobLedger::open(&path).await.expect("open empty");
        let id = ledger.create(Some("carol".to_string())).id();
        ledger.append_status(id, "Generating metadata.").expect("append");
        ledger.mark_succeeded(id).expect("succeed");
        ledger.save().await.expect("save");

        let reopened = JobLedger::open(&path).await.expect("reopen");
        let job = reopened.get(id).expect("job");
        assert_eq!(job.initiated_by(), Some("carol"));
        assert_eq!(job.completion(), Completion::Succeeded);
        assert_eq!(job.progress_message(), "Generating metadata.");
        assert_eq!(reopened.history(), ledger.history());
    }

    #[tokio::test]
    async fn clear_from_another_handle_survives_a_later_save() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join(".chemsearch").join("rebuilds.json");

        let worker = JobLedger::open(&path).await.expect("open worker");
        let id = worker.create(None).id();
        worker.save().await.expect("worker save");

        let admin = JobLedger::open(&path).await.expect("open admin");
        assert_eq!(admin.clear_pending(), vec![id]);
        admin.save().await.expect("admin save");

        worker.append_status(id, "Generating metadata.").expect("append");
        worker.save().await.expect("worker resave");

        let reopened = JobLedger::open(&path).await.expect("reopen");
        assert_eq!(reopened.get(id).expect("job").completion(), Completion::Cleared);
        assert_eq!(worker.get(id).expect("job").completion(), Completion::Cleared);
        assert!(worker.most_recent_pending().is_none());
    }

    #[tokio::test]
    async fn jobs_created_by_two_handles_are_both_kept() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join(".chemsearch").join("rebuilds.json");

        let first = JobLedger::open(&path).await.expect("open first");
        let second = JobLedger::open(&path).await.expect("open second");
        let a = first.create(Some("alice".to_string())).id();
        let b = second.create(Some("bob".to_string())).id();
        first.save().await.expect("first save");
        second.save().await.expect("second save");

        let reopened = JobLedger::open(&path).await.expect("reopen");
        assert!(reopened.get(a).is_ok());
        assert!(reopened.get(b).is_ok());
        assert_eq!(reopened.history().len(), 2);
    }

    #[tokio::test]
    async fn newer_progress_replaces_older_pending_copy() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join(".chemsearch").join("rebuilds.json");

        let worker = JobLedger::open(&path).await.expect("open worker");
        let id = worker.create(None).id();
        worker.save().await.expect("save");
        worker.append_status(id, "Syncing archive.").expect("append");
        worker.mark_succeeded(id).expect("succeed");
        worker.save().await.expect("resave");

        let reopened = JobLedger::open(&path).await.expect("reopen");
        let job = reopened.get(id).expect("job");
        assert_eq!(job.completion(), Completion::Succeeded);
        assert_eq!(job.progress_message(), "Syncing archive.");
    }
}
