//! Full fit: minimization, covariance estimate and goodness of fit.
//!
//! The covariance of a chi-square objective is `2 H⁻¹`, with `H` the Hessian of
//! the chi-square at the minimum. `H` is estimated with central second
//! differences over the free parameters and inverted with a Cholesky solve,
//! adding diagonal damping when the numerical estimate is slightly indefinite.

use nalgebra::DMatrix;

use crate::domain::{FitOutcome, FittedParameter, ParameterSpec};
use crate::error::{FitError, Result};
use crate::fit::loss::LossCombiner;
use crate::fit::minimizer::{Minimizer, Objective};
use crate::math::chi2_p_value;

/// Covariance quality codes reported in [`FitOutcome::covariance_status`].
pub mod covariance_status {
    /// No usable covariance.
    pub const UNAVAILABLE: i32 = 0;
    /// Diagonal approximation from the Hessian diagonal.
    pub const DIAGONAL: i32 = 1;
    /// Full matrix from a damped (forced positive-definite) Hessian.
    pub const FORCED_POS_DEF: i32 = 2;
    /// Full matrix from an undamped positive-definite Hessian.
    pub const ACCURATE: i32 = 3;
}

/// Minimize the combined loss starting from `specs` and estimate uncertainties.
pub fn fit(loss: &LossCombiner<'_>, specs: &[ParameterSpec], minimizer: &dyn Minimizer) -> Result<FitOutcome> {
    let outcome = minimizer.minimize(loss, specs)?;
    if !outcome.converged() {
        tracing::warn!(message = %outcome.message, "minimizer did not converge");
    }

    let free: Vec<usize> = specs
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.fixed)
        .map(|(i, _)| i)
        .collect();

    let (covariance_matrix, cov_status) = match estimate_covariance(loss, &outcome.x, specs, &free) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "covariance estimate failed");
            (vec![vec![0.0; specs.len()]; specs.len()], covariance_status::UNAVAILABLE)
        }
    };
    if cov_status != covariance_status::ACCURATE {
        tracing::warn!(covariance_status = cov_status, "covariance matrix is not accurate");
    }

    let parameters = specs
        .iter()
        .zip(&outcome.x)
        .enumerate()
        .map(|(i, (spec, &value))| FittedParameter {
            name: spec.name.clone(),
            value,
            error: covariance_matrix[i][i].max(0.0).sqrt(),
        })
        .collect();

    let breakdown = loss.eval_contributions(&outcome.x)?;
    let ndf = loss.ndf();

    Ok(FitOutcome {
        status: outcome.status,
        covariance_status: cov_status,
        min_value: outcome.min_value,
        ndf,
        p_value: chi2_p_value(outcome.min_value, ndf),
        parameters,
        covariance_matrix,
        contributions: breakdown.contributions,
        nuisance_penalty: breakdown.nuisance_penalty,
        n_evaluations: outcome.n_evals,
        message: outcome.message,
    })
}

/// Full-size covariance matrix (zero rows for fixed parameters) and its status code.
fn estimate_covariance(
    objective: &dyn Objective,
    x: &[f64],
    specs: &[ParameterSpec],
    free: &[usize],
) -> Result<(Vec<Vec<f64>>, i32)> {
    let n_all = specs.len();
    let mut full = vec![vec![0.0; n_all]; n_all];
    if free.is_empty() {
        return Ok((full, covariance_status::ACCURATE));
    }

    let hessian = finite_difference_hessian(objective, x, free)?;
    let (cov, status) = match invert_hessian(&hessian) {
        Some((inverse, damped)) => {
            let status = if damped {
                covariance_status::FORCED_POS_DEF
            } else {
                covariance_status::ACCURATE
            };
            (inverse * 2.0, status)
        }
        None => {
            let n = free.len();
            let mut diag = DMatrix::zeros(n, n);
            for i in 0..n {
                diag[(i, i)] = 2.0 / hessian[(i, i)].abs().max(1e-12);
            }
            (diag, covariance_status::DIAGONAL)
        }
    };

    for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
            full[i][j] = cov[(a, b)];
        }
    }
    Ok((full, status))
}

/// Symmetric Hessian over the free parameters from central second differences.
fn finite_difference_hessian(objective: &dyn Objective, x: &[f64], free: &[usize]) -> Result<DMatrix<f64>> {
    let n = free.len();
    let steps: Vec<f64> = free.iter().map(|&i| 1e-4 * x[i].abs().max(1.0)).collect();
    let f0 = objective.eval(x)?;

    let eval_shifted = |shifts: &[(usize, f64)]| -> Result<f64> {
        let mut point = x.to_vec();
        for &(k, delta) in shifts {
            point[free[k]] += delta;
        }
        objective.eval(&point)
    };

    let mut hessian = DMatrix::zeros(n, n);
    for a in 0..n {
        let ha = steps[a];
        let fp = eval_shifted(&[(a, ha)])?;
        let fm = eval_shifted(&[(a, -ha)])?;
        hessian[(a, a)] = (fp - 2.0 * f0 + fm) / (ha * ha);

        for b in 0..a {
            let hb = steps[b];
            let fpp = eval_shifted(&[(a, ha), (b, hb)])?;
            let fpm = eval_shifted(&[(a, ha), (b, -hb)])?;
            let fmp = eval_shifted(&[(a, -ha), (b, hb)])?;
            let fmm = eval_shifted(&[(a, -ha), (b, -hb)])?;
            let v = (fpp - fpm - fmp + fmm) / (4.0 * ha * hb);
            hessian[(a, b)] = v;
            hessian[(b, a)] = v;
        }
    }

    if hessian.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Numerical("Hessian has non-finite entries".to_string()));
    }
    Ok(hessian)
}

/// Inverse of a (nearly) positive-definite matrix and whether damping was needed.
fn invert_hessian(hessian: &DMatrix<f64>) -> Option<(DMatrix<f64>, bool)> {
    const MAX_ATTEMPTS: usize = 10;

    let n = hessian.nrows();
    let identity = DMatrix::identity(n, n);
    let diag_scale = (0..n)
        .map(|i| hessian[(i, i)].abs())
        .fold(0.0_f64, f64::max)
        .max(1.0);

    let mut damped = hessian.clone();
    let mut damping = 0.0_f64;
    for attempt in 0..MAX_ATTEMPTS {
        if let Some(chol) = nalgebra::linalg::Cholesky::new(damped.clone()) {
            return Some((chol.solve(&identity), damping > 0.0));
        }
        if attempt + 1 == MAX_ATTEMPTS {
            break;
        }
        let next = if damping == 0.0 { diag_scale * 1e-9 } else { damping * 10.0 };
        for i in 0..n {
            damped[(i, i)] += next - damping;
        }
        damping = next;
    }

    let inverse = damped.lu().try_inverse()?;
    if (0..n).all(|i| inverse[(i, i)].is_finite() && inverse[(i, i)] > 0.0) {
        Some((inverse, true))
    } else {
        None
    }
}
