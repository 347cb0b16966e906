//! Profiled chi-square scan over the first two parameters of interest.
//!
//! At every grid point `p0` and `p1` are fixed and all remaining parameters are
//! re-minimized. Grid points are independent and evaluated in parallel.

use rayon::prelude::*;

use crate::domain::{ParameterSpec, ScanPoint};
use crate::error::{FitError, Result};
use crate::fit::loss::LossCombiner;
use crate::fit::minimizer::Minimizer;

/// Profile the loss on the cartesian grid `p0_values x p1_values`.
///
/// Points come back in row-major order (`p0` outer). A point whose minimization
/// fails is reported with a NaN chi-square rather than aborting the scan.
pub fn profile_scan(
    loss: &LossCombiner<'_>,
    specs: &[ParameterSpec],
    p0_values: &[f64],
    p1_values: &[f64],
    minimizer: &dyn Minimizer,
) -> Result<Vec<ScanPoint>> {
    if loss.num_poi() < 2 {
        return Err(FitError::Config(format!(
            "scan needs at least 2 parameters of interest, model has {}",
            loss.num_poi()
        )));
    }
    if specs.len() != loss.num_params() {
        return Err(FitError::Precondition(format!(
            "expected {} parameter specs, got {}",
            loss.num_params(),
            specs.len()
        )));
    }

    let grid: Vec<(f64, f64)> = p0_values
        .iter()
        .flat_map(|&p0| p1_values.iter().map(move |&p1| (p0, p1)))
        .collect();
    tracing::info!(points = grid.len(), "running profile scan");

    let points = grid
        .par_iter()
        .map(|&(p0, p1)| {
            let mut point_specs = specs.to_vec();
            point_specs[0].fix_at(p0);
            point_specs[1].fix_at(p1);

            let chi2 = match minimizer.minimize(loss, &point_specs) {
                Ok(outcome) => {
                    if !outcome.converged() {
                        tracing::debug!(p0, p1, message = %outcome.message, "scan point did not converge");
                    }
                    outcome.min_value
                }
                Err(e) => {
                    tracing::warn!(p0, p1, error = %e, "scan point failed");
                    f64::NAN
                }
            };
            ScanPoint { p0, p1, chi2 }
        })
        .collect();

    Ok(points)
}
