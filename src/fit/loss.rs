//! Combined loss over heterogeneous measurements.
//!
//! The minimizer sees a flat parameter vector laid out as
//!
//! ```text
//! [ POI_0 .. POI_{n-1} | nuisance_0 .. nuisance_{m-1} ]
//! ```
//!
//! where the POI feed the correction model and the nuisances follow the
//! registration order of the [`NuisanceRegistry`]. The loss is the sum of all
//! measurement chi-squares plus a standard-normal penalty `Σ pull²` on the
//! nuisances, so its scale is that of a chi-square (error definition 1).

use crate::domain::{Contribution, ParameterSpec};
use crate::error::{FitError, Result};
use crate::fit::minimizer::Objective;
use crate::measurements::Measurement;
use crate::models::CorrectionModel;
use crate::nuisance::{NuisanceRegistry, NuisanceValues};

/// Initial step and bounds of the parameters of interest.
const POI_STEP: f64 = 1e-2;
const POI_BOUNDS: (f64, f64) = (-1.0, 1.0);

/// Initial step and bounds of nuisance pulls.
const NUISANCE_STEP: f64 = 1.0;
const NUISANCE_BOUNDS: (f64, f64) = (-5.0, 5.0);

/// Per-measurement breakdown of the loss at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct LossBreakdown {
    pub contributions: Vec<Contribution>,
    pub nuisance_penalty: f64,
}

impl LossBreakdown {
    pub fn total(&self) -> f64 {
        self.contributions.iter().map(|c| c.chi2).sum::<f64>() + self.nuisance_penalty
    }
}

pub struct LossCombiner<'a> {
    model: Box<dyn CorrectionModel>,
    registry: &'a NuisanceRegistry,
    measurements: Vec<Box<dyn Measurement>>,
}

impl<'a> LossCombiner<'a> {
    /// The registry must already hold every nuisance the measurements registered.
    pub fn new(model: Box<dyn CorrectionModel>, registry: &'a NuisanceRegistry) -> Self {
        Self {
            model,
            registry,
            measurements: Vec::new(),
        }
    }

    pub fn add_measurement(&mut self, measurement: Box<dyn Measurement>) {
        tracing::debug!(label = measurement.label(), dim = measurement.dim(), "adding measurement");
        self.measurements.push(measurement);
    }

    pub fn measurements(&self) -> &[Box<dyn Measurement>] {
        &self.measurements
    }

    pub fn model(&self) -> &dyn CorrectionModel {
        self.model.as_ref()
    }

    pub fn registry(&self) -> &NuisanceRegistry {
        self.registry
    }

    /// Number of parameters of interest.
    pub fn num_poi(&self) -> usize {
        self.model.num_params()
    }

    /// Total length of the parameter vector.
    pub fn num_params(&self) -> usize {
        self.num_poi() + self.registry.num_params()
    }

    /// Degrees of freedom of the combined statistic.
    ///
    /// Nuisances come with their own penalty terms and do not reduce the count.
    /// May be zero or negative when the POI outnumber the data points.
    pub fn ndf(&self) -> i64 {
        let points: usize = self.measurements.iter().map(|m| m.ndf()).sum();
        points as i64 - self.num_poi() as i64
    }

    /// Value of the loss for a flat parameter vector.
    pub fn eval_raw_input(&self, params: &[f64]) -> Result<f64> {
        let (model, nuisances) = self.split(params)?;

        let chi2: f64 = self
            .measurements
            .iter()
            .map(|m| m.eval(model.as_ref(), &nuisances))
            .sum();

        Ok(chi2 + nuisances.sum_of_squares())
    }

    /// Loss split into per-measurement contributions and the nuisance penalty.
    pub fn eval_contributions(&self, params: &[f64]) -> Result<LossBreakdown> {
        let (model, nuisances) = self.split(params)?;

        let contributions = self
            .measurements
            .iter()
            .map(|m| Contribution {
                label: m.label().to_string(),
                chi2: m.eval(model.as_ref(), &nuisances),
                ndf: m.ndf(),
            })
            .collect();

        Ok(LossBreakdown {
            contributions,
            nuisance_penalty: nuisances.sum_of_squares(),
        })
    }

    /// Initial values, steps and bounds of every parameter, in vector order.
    pub fn parameter_specs(&self) -> Vec<ParameterSpec> {
        let poi = (0..self.num_poi()).map(|i| {
            ParameterSpec::free(format!("p{i}"), 0.0, POI_STEP, POI_BOUNDS.0, POI_BOUNDS.1)
        });
        let nuisances = self.registry.names().map(|name| {
            ParameterSpec::free(name, 0.0, NUISANCE_STEP, NUISANCE_BOUNDS.0, NUISANCE_BOUNDS.1)
        });
        poi.chain(nuisances).collect()
    }

    fn split<'s>(
        &'s self,
        params: &[f64],
    ) -> Result<(Box<dyn CorrectionModel>, NuisanceValues<'s>)> {
        if self.measurements.is_empty() {
            return Err(FitError::Config("No measurements requested.".to_string()));
        }
        if params.len() != self.num_params() {
            return Err(FitError::Precondition(format!(
                "expected {} parameters, got {}",
                self.num_params(),
                params.len()
            )));
        }

        let (poi, nuisance_values) = params.split_at(self.num_poi());
        let model = self.model.with_params(poi)?;
        let nuisances = self.registry.build(nuisance_values)?;
        Ok((model, nuisances))
    }
}

impl Objective for LossCombiner<'_> {
    fn num_params(&self) -> usize {
        LossCombiner::num_params(self)
    }

    fn eval(&self, params: &[f64]) -> Result<f64> {
        self.eval_raw_input(params)
    }
}
