//! Domain models for the verifier portal
//!
//! Registry snapshots, proofs, compiler settings, submission entries and
//! transaction flow types. Nothing here performs I/O.

mod compiler;
mod proof;
mod submission;
mod transaction;
mod types;
mod verifier;

pub use compiler::*;
pub use proof::*;
pub use submission::*;
pub use transaction::*;
pub use types::*;
pub use verifier::*;
