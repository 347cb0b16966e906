//! Grid generation for scans and pseudo-data binning.

use crate::error::{FitError, Result};

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && max >= min) {
        return Err(FitError::Config(format!(
            "Invalid grid range: min={min}, max={max} (must be finite and max>=min)."
        )));
    }
    if steps == 1 {
        return Ok(vec![min]);
    }
    if steps == 0 {
        return Err(FitError::Config("Grid steps must be >= 1.".to_string()));
    }

    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| min + step * i as f64).collect())
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(FitError::Config(format!(
            "Invalid log range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(FitError::Config("Log grid steps must be >= 2.".to_string()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}
