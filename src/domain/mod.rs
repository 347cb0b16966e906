//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input configuration enums (`BalanceMethod`, `CorrectionForm`)
//! - measurement inputs (`PtBin`, `SystematicShift`, `PhotonJetData`)
//! - the minimizer parameter layout (`ParameterSpec`)
//! - fit outputs (`FitOutcome`, `FittedParameter`, `ResultsFile`, etc.)

pub mod types;

pub use types::*;
