//! # Chemsearch Indexer
//!
//! Archive rebuilds: job bookkeeping, archive sync and index publication.
//!
//! ## Pipeline
//!
//! ```text
//! RebuildOrchestrator::run
//!     │
//!     ├──> JobLedger (pending job, status log, rebuilds.json)
//!     │
//!     ├──> ArchiveSource::sync (local directory or mirrored listing)
//!     │      └─> ArchiveTree
//!     │
//!     ├──> assemble + parse_records (blocking pool)
//!     │      └─> MoleculeRecord[] + manifest.json
//!     │
//!     └──> MoleculeIndex::build → IndexHandle::publish
//!            └─> job marked succeeded
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use chemsearch_index::IndexHandle;
//! use chemsearch_indexer::{ArchiveConfig, JobLedger, RebuildOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ArchiveConfig::local("/srv/archive");
//!     let ledger = JobLedger::open(chemsearch_indexer::ledger_path(&config.root)).await?;
//!     let orchestrator = RebuildOrchestrator::new(config, ledger, IndexHandle::default());
//!     let outcome = orchestrator.rebuild(None).await?;
//!
//!     println!("Indexed {} molecules", outcome.stats.valid);
//!     Ok(())
//! }
//! ```

mod archive;
mod assembly;
mod config;
mod error;
mod job;
mod ledger;
mod ledger_lock;
mod orchestrator;
mod paths;
mod scanner;
mod stats;

pub use archive::{
    ArchiveSource, ArchiveTree, DirectoryListing, LocalArchive, MirroredArchive, RemoteEntry,
    RemoteListing, SyncReport,
};
pub use assembly::{assemble, parse_records, Manifest, ManifestEntry};
pub use config::{ArchiveConfig, SourceConfig};
pub use error::{IndexerError, Result};
pub use job::{Completion, JobId, RebuildJob, StatusEntry};
pub use ledger::{BuildStatus, JobLedger};
pub use orchestrator::{RebuildContext, RebuildOrchestrator, RebuildOutcome};
pub use paths::{ledger_path, manifest_path, rebuild_log_path, state_dir, STATE_DIR_NAME};
pub use scanner::ArchiveScanner;
pub use stats::RebuildStats;
