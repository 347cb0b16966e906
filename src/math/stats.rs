//! Goodness-of-fit helpers.

use statrs::function::gamma::gamma_ur;

/// Probability that a chi-square variable with `ndf` degrees of freedom exceeds `chi2`.
///
/// Computed as the upper regularized incomplete gamma `Q(ndf/2, chi2/2)`.
/// Returns NaN when `ndf <= 0` or `chi2` is not a finite non-negative number.
pub fn chi2_p_value(chi2: f64, ndf: i64) -> f64 {
    if ndf <= 0 || !chi2.is_finite() || chi2 < 0.0 {
        return f64::NAN;
    }
    if chi2 == 0.0 {
        return 1.0;
    }
    gamma_ur(ndf as f64 / 2.0, chi2 / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn two_dof_matches_closed_form() {
        // For ndf = 2 the survival function is exp(-chi2/2).
        for chi2 in [0.5, 1.0, 3.0, 10.0] {
            assert_relative_eq!(chi2_p_value(chi2, 2), (-chi2 / 2.0_f64).exp(), epsilon = 1e-10);
        }
    }

    #[test]
    fn undefined_for_non_positive_ndf() {
        assert!(chi2_p_value(1.0, 0).is_nan());
        assert!(chi2_p_value(1.0, -3).is_nan());
        assert_eq!(chi2_p_value(0.0, 4), 1.0);
    }
}
