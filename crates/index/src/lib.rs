//! # Chemsearch Index
//!
//! In-memory molecule index rebuilt from the archive and published atomically.
//!
//! ```text
//! MoleculeRecord[] (assembly order)
//!     │
//!     ├──> DuplicateTracker (identity key → records)
//!     │
//!     ├──> MoleculeIndex (valid records, invalid files, key lookup)
//!     │
//!     └──> IndexHandle::publish (watch channel swap)
//!            └─> readers hold Arc<MoleculeIndex> snapshots
//! ```

mod duplicates;
mod error;
mod export;
mod handle;
mod index;
mod record;

pub use duplicates::DuplicateTracker;
pub use error::{IndexError, Result};
pub use export::{export_filename, export_sdf};
pub use handle::IndexHandle;
pub use index::{MoleculeIndex, MoleculeLookup};
pub use record::{MoleculeRecord, RecordSource};
