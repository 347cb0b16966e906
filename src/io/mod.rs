//! Input/output helpers.
//!
//! - photon+jet CSV ingest + validation (`ingest`)
//! - result, residual, scan and pseudo-data exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
