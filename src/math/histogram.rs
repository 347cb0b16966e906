//! Histogram-like inputs.
//!
//! Morphing only needs one scalar per bin in bin order, so histogram-shaped
//! reference values are accepted through the small [`BinnedValues`] trait.

/// Anything that exposes per-bin contents with zero-based, stable indices.
pub trait BinnedValues {
    fn num_bins(&self) -> usize;

    /// Content of the given zero-based bin. Callers stay below `num_bins()`.
    fn bin_content(&self, bin: usize) -> f64;
}

impl BinnedValues for [f64] {
    fn num_bins(&self) -> usize {
        self.len()
    }

    fn bin_content(&self, bin: usize) -> f64 {
        self[bin]
    }
}

impl BinnedValues for Vec<f64> {
    fn num_bins(&self) -> usize {
        self.len()
    }

    fn bin_content(&self, bin: usize) -> f64 {
        self[bin]
    }
}
