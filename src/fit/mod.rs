//! Fitting machinery.
//!
//! Responsibilities:
//!
//! - combine measurements, correction model and nuisances into one loss (`loss`)
//! - bounded minimization of that loss (`minimizer`)
//! - covariance, p-value and per-measurement breakdown of the best fit (`fitter`)
//! - profiled chi-square scans over the parameters of interest (`scan`)

pub mod fitter;
pub mod loss;
pub mod minimizer;
pub mod scan;

pub use fitter::*;
pub use loss::*;
pub use minimizer::*;
pub use scan::*;
