//! Correction models: multiplicative jet corrections as functions of pt.
//!
//! A model is an immutable value holding its parameters of interest. The loss
//! function never mutates a model in place; it asks for a fresh instance with
//! the parameters proposed by the minimizer via [`CorrectionModel::with_params`].

use crate::domain::CorrectionForm;
use crate::error::{FitError, Result};
use crate::models::spline::SplineCorrection;

/// Reference pt scale of the standard parameterization.
pub const PT_REF: f64 = 208.0;

/// Smallest pt at which [`Std2P`] is evaluated. Non-positive pt, reached only
/// for a photon scale shift at or below -100%, is evaluated here as well.
const PT_FLOOR: f64 = 1e-3;

/// Parametric correction factor evaluated at a given pt.
pub trait CorrectionModel: Send + Sync {
    /// Short label used in reports.
    fn label(&self) -> &'static str;

    fn num_params(&self) -> usize;

    fn params(&self) -> &[f64];

    /// Correction factor at `pt`.
    fn eval(&self, pt: f64) -> f64;

    /// A new model of the same form with the given parameters.
    fn with_params(&self, params: &[f64]) -> Result<Box<dyn CorrectionModel>>;
}

/// Standard two-parameter form `1 + p0 + p1 ln(pt / 208)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Std2P {
    params: [f64; 2],
}

impl Std2P {
    pub fn new(p0: f64, p1: f64) -> Self {
        Self { params: [p0, p1] }
    }
}

impl CorrectionModel for Std2P {
    fn label(&self) -> &'static str {
        "2p"
    }

    fn num_params(&self) -> usize {
        2
    }

    fn params(&self) -> &[f64] {
        &self.params
    }

    fn eval(&self, pt: f64) -> f64 {
        let pt = pt.max(PT_FLOOR);
        1.0 + self.params[0] + self.params[1] * (pt / PT_REF).ln()
    }

    fn with_params(&self, params: &[f64]) -> Result<Box<dyn CorrectionModel>> {
        let [p0, p1] = params else {
            return Err(FitError::Precondition(format!(
                "2p correction takes 2 parameters, got {}",
                params.len()
            )));
        };
        Ok(Box::new(Self::new(*p0, *p1)))
    }
}

/// Construct a model of the requested form with all parameters at zero.
pub fn build_correction(form: CorrectionForm) -> Result<Box<dyn CorrectionModel>> {
    match form {
        CorrectionForm::Std2P => Ok(Box::new(Std2P::default())),
        CorrectionForm::Spline => Ok(Box::new(SplineCorrection::new(30.0, 1500.0, 5)?)),
    }
}
