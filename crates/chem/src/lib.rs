//! # Chemsearch Chem
//!
//! Structure parsing, identity and matching for the molecule archive.
//!
//! ## Pipeline
//!
//! ```text
//! .mol / .sdf / .smi
//!     │
//!     ├──> Parser (molfile V2000, SMILES)
//!     │      └─> Molecule graph
//!     │
//!     ├──> Normalisation
//!     │      ├─> Fold explicit hydrogens
//!     │      ├─> Implicit hydrogens (default valences)
//!     │      ├─> Rings (up to 8 atoms)
//!     │      └─> Aromaticity (Hückel 4n+2)
//!     │
//!     └──> Structure
//!            ├─> Identity key (canonical labelling, stereo in block two)
//!            ├─> Path fingerprint (2048 bits)
//!            └─> Mol block for export
//! ```
//!
//! ## Example
//!
//! ```
//! use chemsearch_chem::{Query, Structure};
//!
//! let phenol = Structure::from_smiles("Oc1ccccc1")?;
//! let cresol = Structure::from_smiles("Cc1ccc(O)cc1")?;
//!
//! assert!(cresol.contains(&Query::structure("c1ccccc1O")?));
//! assert!(cresol.contains(&Query::pattern("[OH]c")?));
//! assert!(phenol.similarity(cresol.fingerprint()) < 1.0);
//! # Ok::<(), chemsearch_chem::ChemError>(())
//! ```

mod aromaticity;
mod canonical;
mod element;
mod error;
mod fingerprint;
mod mol;
mod molfile;
mod rings;
mod smarts;
mod smiles;
mod stereo;
mod structure;
mod substruct;

pub use canonical::IdentityKey;
pub use element::{atomic_number, symbol};
pub use error::{ChemError, Result};
pub use fingerprint::{Fingerprint, FINGERPRINT_BITS, MAX_PATH_BONDS};
pub use mol::{Atom, BondOrder, Molecule};
pub use molfile::{parse_molfile, sdf_records, write_molfile};
pub use rings::MAX_RING_SIZE;
pub use smarts::{parse_smarts, AtomExpr, AtomPrimitive, BondExpr, BondPrimitive, Expr, QueryMol};
pub use smiles::parse_smiles;
pub use stereo::{DoubleBondStereo, TetrahedralCenter};
pub use structure::{Query, Structure, STRUCTURE_EXTENSIONS};
pub use substruct::has_substructure;
