use crate::archive::ArchiveSource;
use crate::assembly::{assemble, parse_records, Manifest};
use crate::config::ArchiveConfig;
use crate::error::{IndexerError, Result};
use crate::job::JobId;
use crate::ledger::JobLedger;
use crate::paths::rebuild_log_path;
use crate::stats::RebuildStats;
use chemsearch_index::{IndexHandle, MoleculeIndex};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

/// Everything a rebuild task needs, handed over when the task starts.
#[derive(Debug, Clone)]
pub struct RebuildContext {
    pub job: JobId,
    pub config: ArchiveConfig,
    pub log_path: PathBuf,
}

/// Result of a finished rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildOutcome {
    pub job: JobId,
    pub generation: u64,
    pub stats: RebuildStats,
}

/// Drives rebuilds: archive sync, metadata assembly, index build and publication.
///
/// The orchestrator is the only writer of the published index. It does not
/// prevent concurrent rebuilds; callers consult the ledger first.
#[derive(Clone)]
pub struct RebuildOrchestrator {
    config: ArchiveConfig,
    source: Arc<dyn ArchiveSource>,
    ledger: JobLedger,
    handle: IndexHandle,
}

impl RebuildOrchestrator {
    pub fn new(config: ArchiveConfig, ledger: JobLedger, handle: IndexHandle) -> Self {
        let source = config.open_source();
        Self {
            config,
            source,
            ledger,
            handle,
        }
    }

    /// Replace the archive adapter built from the configuration.
    pub fn with_source(mut self, source: Arc<dyn ArchiveSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    /// Start a rebuild and return its id.
    ///
    /// With `run_async` the pipeline runs on a spawned task and this returns as
    /// soon as the job is recorded. Otherwise it waits and returns the pipeline
    /// error, if any; a failed job stays pending either way.
    pub async fn run(&self, initiated_by: Option<String>, run_async: bool) -> Result<JobId> {
        let ctx = self.start(initiated_by).await?;
        let job = ctx.job;
        if run_async {
            let worker = self.clone();
            tokio::spawn(async move {
                if let Err(err) = worker.execute(&ctx).await {
                    log::warn!("Rebuild {} failed: {err}", ctx.job);
                }
            });
        } else {
            self.execute(&ctx).await?;
        }
        Ok(job)
    }

    /// Run a rebuild in the caller's task and return its statistics.
    pub async fn rebuild(&self, initiated_by: Option<String>) -> Result<RebuildOutcome> {
        let ctx = self.start(initiated_by).await?;
        self.execute(&ctx).await
    }

    /// Publish the index described by the last manifest without recording a job.
    ///
    /// Returns `None` when no rebuild has written a manifest yet.
    pub async fn restore(&self) -> Result<Option<Arc<MoleculeIndex>>> {
        let Some(manifest) = Manifest::read(&self.config.root).await? else {
            return Ok(None);
        };
        let records = parse_records(manifest.sources(&self.config.root)).await?;
        log::info!(
            "Restoring index from rebuild {} ({} files)",
            manifest.job,
            records.len()
        );
        Ok(Some(self.handle.publish(MoleculeIndex::build(records))))
    }

    /// Force every pending rebuild to cleared. Running tasks are not interrupted.
    pub async fn clear_rebuilds(&self) -> Result<Vec<JobId>> {
        let cleared = self.ledger.clear_pending();
        self.ledger.save().await?;
        Ok(cleared)
    }

    async fn start(&self, initiated_by: Option<String>) -> Result<RebuildContext> {
        let job = self.ledger.create(initiated_by);
        self.ledger.save().await?;
        let ctx = RebuildContext {
            job: job.id(),
            config: self.config.clone(),
            log_path: rebuild_log_path(&self.config.root, job.id()),
        };
        self.log_line(&ctx, job.progress_message()).await;
        Ok(ctx)
    }

    async fn execute(&self, ctx: &RebuildContext) -> Result<RebuildOutcome> {
        let result = self.pipeline(ctx).await;
        if let Err(err) = &result {
            self.log_line(ctx, &format!("Rebuild failed: {err}")).await;
        }
        result
    }

    async fn pipeline(&self, ctx: &RebuildContext) -> Result<RebuildOutcome> {
        let started = Instant::now();

        self.status(
            ctx,
            format!(
                "Identifying categories and structure files in {}.",
                self.source.location()
            ),
        )
        .await?;
        if self.source.is_mirrored() {
            self.status(ctx, "Updating local archive.").await?;
        }
        let tree = self.source.sync().await?;

        self.status(ctx, "Generating metadata.").await?;
        let sources = assemble(&tree).await?;
        let records = parse_records(sources).await?;
        Manifest::new(ctx.job, &tree.root, &records)
            .write(&ctx.config.root)
            .await?;

        let index = MoleculeIndex::build(records);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let stats = RebuildStats::of_index(&index, elapsed_ms);
        let published = self.handle.publish(index);

        self.status(
            ctx,
            format!("Completed rebuild contains {} molecules.", published.len()),
        )
        .await?;
        match self.ledger.mark_succeeded(ctx.job) {
            Ok(()) => {}
            Err(err @ IndexerError::JobFinalized { .. }) => log::warn!("{err}"),
            Err(err) => return Err(err),
        }
        self.ledger.save().await?;

        log::info!(
            "Rebuild {} finished in {} ms: {} molecules, {} invalid, {} duplicated keys",
            ctx.job,
            stats.time_ms,
            stats.valid,
            stats.invalid,
            stats.duplicated_keys
        );
        Ok(RebuildOutcome {
            job: ctx.job,
            generation: published.generation(),
            stats,
        })
    }

    /// Append to the job's status log. A job cleared mid-run keeps its final state.
    async fn status(&self, ctx: &RebuildContext, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        log::info!("Rebuild {}: {message}", ctx.job);
        match self.ledger.append_status(ctx.job, message.clone()) {
            Ok(()) => {}
            Err(err @ IndexerError::JobFinalized { .. }) => log::warn!("{err}"),
            Err(err) => return Err(err),
        }
        self.ledger.save().await?;
        self.log_line(ctx, &message).await;
        Ok(())
    }

    async fn log_line(&self, ctx: &RebuildContext, message: &str) {
        if let Err(err) = append_line(&ctx.log_path, message).await {
            log::warn!(
                "Failed to write rebuild log {}: {err}",
                ctx.log_path.display()
            );
        }
    }
}

async fn append_line(path: &std::path::Path, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let line = format!("{} {message}\n", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
