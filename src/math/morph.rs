//! Three-point morphing of binned quantities.
//!
//! Each bin carries a triple `(down, central, up)` that is reproduced exactly at
//! pulls `x = -1, 0, +1`. In between, the value follows
//!
//! ```text
//! f(x) = c + x (u - d) / 2 + S(|x|) (u + d - 2c) / 2,    |x| <= 1
//! ```
//!
//! where `S` is [`smooth_step`]. Outside `[-1, 1]` the curve continues linearly:
//!
//! ```text
//! f(x) = u + (u - c)(x - 1),    x > 1
//! f(x) = d + (c - d)(x + 1),    x < -1
//! ```
//!
//! `S'(1) = 1` makes the slope of the interior curve at `x = ±1` equal to the
//! extrapolation slope, so the morph is continuous together with its first
//! derivative. Bins never influence each other.

use crate::error::{FitError, Result};
use crate::math::histogram::BinnedValues;

/// Per-bin three-point interpolation with linear extrapolation.
#[derive(Debug, Clone, Default)]
pub struct SmoothMorph {
    central: Vec<f64>,
    up: Vec<f64>,
    down: Vec<f64>,
}

impl SmoothMorph {
    /// Construct from central, up, and down reference values.
    pub fn new(central: Vec<f64>, up: Vec<f64>, down: Vec<f64>) -> Result<Self> {
        if central.len() != up.len() || central.len() != down.len() {
            return Err(FitError::Precondition(format!(
                "morph reference lengths differ: central={}, up={}, down={}",
                central.len(),
                up.len(),
                down.len()
            )));
        }

        Ok(Self { central, up, down })
    }

    /// Construct from up and down reference values; central values are zero.
    ///
    /// This is the natural form for systematic shifts given relative to nominal.
    pub fn from_up_down(up: Vec<f64>, down: Vec<f64>) -> Result<Self> {
        let central = vec![0.0; up.len()];
        Self::new(central, up, down)
    }

    /// Construct from histogram-like inputs, one triple per bin in bin order.
    pub fn from_histograms<H: BinnedValues + ?Sized>(central: &H, up: &H, down: &H) -> Result<Self> {
        Self::new(collect_bins(central), collect_bins(up), collect_bins(down))
    }

    /// Histogram counterpart of [`SmoothMorph::from_up_down`].
    pub fn from_histograms_up_down<H: BinnedValues + ?Sized>(up: &H, down: &H) -> Result<Self> {
        Self::from_up_down(collect_bins(up), collect_bins(down))
    }

    pub fn num_bins(&self) -> usize {
        self.central.len()
    }

    /// Interpolated/extrapolated value in the given zero-based bin.
    pub fn eval(&self, bin: usize, x: f64) -> Result<f64> {
        if bin >= self.num_bins() {
            return Err(FitError::Precondition(format!(
                "morph bin index {bin} out of range (bins: {})",
                self.num_bins()
            )));
        }

        Ok(self.eval_in_range(bin, x))
    }

    /// Values of all bins at pull `x`, in bin order.
    pub fn eval_all(&self, x: f64) -> impl Iterator<Item = f64> + '_ {
        (0..self.num_bins()).map(move |bin| self.eval_in_range(bin, x))
    }

    fn eval_in_range(&self, bin: usize, x: f64) -> f64 {
        let c = self.central[bin];
        let u = self.up[bin];
        let d = self.down[bin];

        if x > 1.0 {
            u + (u - c) * (x - 1.0)
        } else if x < -1.0 {
            d + (c - d) * (x + 1.0)
        } else {
            c + 0.5 * x * (u - d) + 0.5 * smooth_step(x.abs()) * (u + d - 2.0 * c)
        }
    }
}

/// Smooth step on `[0, 1]`: `S(t) = (3t^6 - 10t^4 + 15t^2) / 8`.
///
/// `S(0) = 0`, `S(1) = 1`, `S'(0) = 0`, `S'(1) = 1`, `S''(1) = 0`, and `S` is
/// monotone non-decreasing on the domain. Arguments are clamped to `[0, 1]`.
pub fn smooth_step(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let t2 = t * t;
    (t2 * (15.0 + t2 * (-10.0 + 3.0 * t2))) / 8.0
}

fn collect_bins<H: BinnedValues + ?Sized>(hist: &H) -> Vec<f64> {
    (0..hist.num_bins()).map(|i| hist.bin_content(i)).collect()
}
