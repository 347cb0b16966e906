//! Synthetic constraint on the correction at a reference pt.
//!
//! Injects external calibration knowledge without a full dataset: the
//! correction at `pt_ref` must match `target` within a relative uncertainty.

use std::str::FromStr;

use crate::error::{FitError, Result};
use crate::measurements::Measurement;
use crate::models::{CorrectionModel, PT_REF};
use crate::nuisance::NuisanceValues;

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionConstraint {
    pt_ref: f64,
    target: f64,
    rel_unc: f64,
}

impl CorrectionConstraint {
    pub fn new(pt_ref: f64, target: f64, rel_unc: f64) -> Result<Self> {
        if !(pt_ref.is_finite() && pt_ref > 0.0) {
            return Err(FitError::Config(format!(
                "constraint reference pt must be positive, got {pt_ref}"
            )));
        }
        if !(target.is_finite() && target != 0.0) {
            return Err(FitError::Config(format!(
                "constraint target must be finite and non-zero, got {target}"
            )));
        }
        if !(rel_unc.is_finite() && rel_unc > 0.0) {
            return Err(FitError::Config(format!(
                "constraint relative uncertainty must be positive, got {rel_unc}"
            )));
        }

        Ok(Self {
            pt_ref,
            target,
            rel_unc,
        })
    }

    pub fn pt_ref(&self) -> f64 {
        self.pt_ref
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn rel_unc(&self) -> f64 {
        self.rel_unc
    }
}

/// Parses `"target,rel_unc"` (reference pt 208) or `"pt_ref,target,rel_unc"`.
impl FromStr for CorrectionConstraint {
    type Err = FitError;

    fn from_str(text: &str) -> Result<Self> {
        let parse_failure = || FitError::Config(format!("Failed to parse constraint \"{text}\"."));

        let values = text
            .split(',')
            .map(|token| token.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|_| parse_failure())?;

        match values[..] {
            [target, rel_unc] => Self::new(PT_REF, target, rel_unc),
            [pt_ref, target, rel_unc] => Self::new(pt_ref, target, rel_unc),
            _ => Err(parse_failure()),
        }
    }
}

impl Measurement for CorrectionConstraint {
    fn label(&self) -> &str {
        "Constraint"
    }

    fn eval(&self, corrector: &dyn CorrectionModel, _nuisances: &NuisanceValues<'_>) -> f64 {
        ((corrector.eval(self.pt_ref) - self.target) / (self.target * self.rel_unc)).powi(2)
    }

    fn dim(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Std2P;
    use crate::nuisance::NuisanceRegistry;
    use approx::assert_relative_eq;

    #[test]
    fn parses_two_fields_with_default_pt() {
        let c: CorrectionConstraint = "1.02,0.01".parse().unwrap();
        assert_eq!(c.pt_ref(), 208.0);
        assert_eq!(c.target(), 1.02);
        assert_eq!(c.rel_unc(), 0.01);
    }

    #[test]
    fn parses_three_fields() {
        let c: CorrectionConstraint = "150,1.02,0.01".parse().unwrap();
        assert_eq!(c.pt_ref(), 150.0);
        assert_eq!(c.target(), 1.02);
        assert_eq!(c.rel_unc(), 0.01);
    }

    #[test]
    fn rejects_malformed_text() {
        for text in ["1.02", "", "a,b", "1,2,3,4", "1.02,", "150,x,0.01"] {
            let err = text.parse::<CorrectionConstraint>().unwrap_err();
            assert!(matches!(err, FitError::Config(_)), "accepted {text:?}");
        }
    }

    #[test]
    fn rejects_non_positive_uncertainty() {
        assert!("1.02,0".parse::<CorrectionConstraint>().is_err());
        assert!("1.02,-0.01".parse::<CorrectionConstraint>().is_err());
    }

    #[test]
    fn chi2_is_pull_squared() {
        let registry = NuisanceRegistry::new();
        let c = CorrectionConstraint::new(208.0, 1.02, 0.01).unwrap();
        let model = Std2P::new(0.0306, 0.5);
        // At pt_ref the log term vanishes: corr = 1.0306, pull = 0.0106 / 0.0102.
        let expected = (0.0106_f64 / 0.0102).powi(2);
        assert_relative_eq!(c.eval(&model, &registry.nominal()), expected, epsilon = 1e-9);
        assert_eq!(c.ndf(), 1);
        assert_eq!(c.dim(), 1);
    }
}
