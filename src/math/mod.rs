//! Numerical primitives: morphing, binned containers, grids, and p-values.

pub mod grid;
pub mod histogram;
pub mod morph;
pub mod stats;

pub use grid::*;
pub use histogram::*;
pub use morph::*;
pub use stats::*;
