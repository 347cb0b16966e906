//! Nuisance parameters shared by all measurements.

pub mod registry;

pub use registry::*;
