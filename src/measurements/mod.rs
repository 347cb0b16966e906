//! Measurements entering the combined fit.
//!
//! - `measurement`: the shared [`Measurement`] trait
//! - `photon_jet`: photon+jet balance in bins of photon pt
//! - `constraint`: synthetic prior on the correction at a reference pt

pub mod constraint;
pub mod measurement;
pub mod photon_jet;

pub use constraint::*;
pub use measurement::*;
pub use photon_jet::*;
