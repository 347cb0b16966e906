//! Shared "fit pipeline" logic used by the `fit` and `scan` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! parse constraint -> load measurements -> register nuisances -> combine loss -> minimize
//!
//! The command handlers can then focus on presentation and file output.

use crate::domain::{FitConfig, FitOutcome, MeasurementConfig, Residual, ScanConfig, ScanPoint};
use crate::error::{FitError, Result};
use crate::fit::{LbfgsMinimizer, LossCombiner, fit, profile_scan};
use crate::math::lin_space;
use crate::measurements::{CorrectionConstraint, Measurement, PHOTON_SCALE, PhotonJet};
use crate::models::build_correction;
use crate::nuisance::NuisanceRegistry;

/// Measurements requested by a run.
pub struct MeasurementSet {
    pub measurements: Vec<Box<dyn Measurement>>,
    /// Copy of the photon+jet measurement, kept for residual export.
    pub photonjet: Option<PhotonJet>,
}

/// All computed outputs of a single `jecfit fit` run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub outcome: FitOutcome,
    /// Photon+jet residuals at the best fit, when that measurement was requested.
    pub residuals: Option<Vec<Residual>>,
}

/// Build every requested measurement, registering their nuisances.
///
/// Configuration problems (malformed constraint, bad pt range, empty request)
/// are reported before any input file is read.
pub fn build_measurements(
    config: &MeasurementConfig,
    registry: &mut NuisanceRegistry,
) -> Result<MeasurementSet> {
    if !(config.pt_min <= config.pt_max) {
        return Err(FitError::Config(format!(
            "Invalid pt range [{}, {}].",
            config.pt_min, config.pt_max
        )));
    }

    let constraint = config
        .constraint
        .as_deref()
        .map(str::parse::<CorrectionConstraint>)
        .transpose()?;

    if config.photonjet.is_none() && constraint.is_none() {
        return Err(FitError::Config("No measurements requested.".to_string()));
    }

    let mut measurements: Vec<Box<dyn Measurement>> = Vec::new();
    let mut photonjet = None;

    if let Some(path) = &config.photonjet {
        let mut pj = PhotonJet::from_csv(path, config.method, registry, &config.exclude_syst)?;
        pj.set_pt_range(config.pt_min, config.pt_max);
        if pj.dim() == 0 {
            tracing::warn!(
                pt_min = config.pt_min,
                pt_max = config.pt_max,
                "no photon+jet bins inside the pt range"
            );
        }
        measurements.push(Box::new(pj.clone()));
        photonjet = Some(pj);
    }

    if let Some(constraint) = constraint {
        tracing::info!(
            pt_ref = constraint.pt_ref(),
            target = constraint.target(),
            rel_unc = constraint.rel_unc(),
            "adding correction constraint"
        );
        measurements.push(Box::new(constraint));
    }

    Ok(MeasurementSet {
        measurements,
        photonjet,
    })
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<FitRun> {
    let mut registry = NuisanceRegistry::new();
    let set = build_measurements(&config.measurements, &mut registry)?;

    let mut loss = LossCombiner::new(build_correction(config.measurements.corr_form)?, &registry);
    for measurement in set.measurements {
        loss.add_measurement(measurement);
    }
    tracing::info!(
        parameters = loss.num_params(),
        nuisances = registry.num_params(),
        ndf = loss.ndf(),
        "starting fit"
    );

    let specs = loss.parameter_specs();
    let mut outcome = fit(&loss, &specs, &LbfgsMinimizer::with_max_iter(config.max_iter))?;

    let residuals = match &set.photonjet {
        Some(pj) => {
            let values: Vec<f64> = outcome.parameters.iter().map(|p| p.value).collect();
            let (poi, nuisances) = values.split_at(loss.num_poi());
            let model = loss.model().with_params(poi)?;
            let nuisances = registry.build(nuisances)?;

            if let Some(scale) = nuisances.by_name(PHOTON_SCALE).filter(|s| 1.0 + s <= 0.0) {
                tracing::warn!(photon_scale = scale, "fitted photon pt scale is not positive");
                outcome.status = 1;
                outcome.message = format!("{}; non-physical photon scale {scale}", outcome.message);
            }
            Some(pj.residuals(model.as_ref(), &nuisances))
        }
        None => None,
    };

    Ok(FitRun { outcome, residuals })
}

/// Profile the chi-square over the configured `(p0, p1)` grid.
pub fn run_scan(config: &ScanConfig) -> Result<Vec<ScanPoint>> {
    let p0 = lin_space(config.p0_range.0, config.p0_range.1, config.steps)?;
    let p1 = lin_space(config.p1_range.0, config.p1_range.1, config.steps)?;

    let mut registry = NuisanceRegistry::new();
    let set = build_measurements(&config.measurements, &mut registry)?;

    let mut loss = LossCombiner::new(build_correction(config.measurements.corr_form)?, &registry);
    for measurement in set.measurements {
        loss.add_measurement(measurement);
    }

    let specs = loss.parameter_specs();
    profile_scan(&loss, &specs, &p0, &p1, &LbfgsMinimizer::with_max_iter(config.max_iter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BalanceMethod, CorrectionForm};
    use std::path::PathBuf;

    fn measurement_config() -> MeasurementConfig {
        MeasurementConfig {
            photonjet: None,
            method: BalanceMethod::PtBal,
            corr_form: CorrectionForm::Std2P,
            constraint: None,
            exclude_syst: Vec::new(),
            pt_min: 0.0,
            pt_max: 1600.0,
        }
    }

    #[test]
    fn empty_request_is_config_error() {
        let mut registry = NuisanceRegistry::new();
        let err = build_measurements(&measurement_config(), &mut registry).err().unwrap();
        assert!(matches!(err, FitError::Config(ref m) if m == "No measurements requested."));
    }

    #[test]
    fn malformed_constraint_is_reported_before_loading() {
        let mut config = measurement_config();
        config.photonjet = Some(PathBuf::from("/nonexistent/photonjet.csv"));
        config.constraint = Some("1.02".to_string());
        let mut registry = NuisanceRegistry::new();
        let err = build_measurements(&config, &mut registry).err().unwrap();
        assert!(matches!(err, FitError::Config(_)));
    }

    #[test]
    fn missing_input_is_data_source_error() {
        let mut config = measurement_config();
        config.photonjet = Some(PathBuf::from("/nonexistent/photonjet.csv"));
        let mut registry = NuisanceRegistry::new();
        let err = build_measurements(&config, &mut registry).err().unwrap();
        assert!(matches!(err, FitError::DataSource { .. }));
    }

    #[test]
    fn constraint_only_fit_runs() {
        let mut config = measurement_config();
        config.constraint = Some("1.02,0.01".to_string());
        let run = run_fit(&FitConfig {
            measurements: config,
            output: PathBuf::from("unused.out"),
            residuals: None,
            max_iter: 200,
        })
        .unwrap();

        assert!(run.residuals.is_none());
        assert_eq!(run.outcome.parameters.len(), 2);
        let corr = 1.0 + run.outcome.parameters[0].value;
        assert!((corr - 1.02).abs() < 1e-4, "corr at reference pt: {corr}");
        assert!(run.outcome.min_value < 1e-6);
    }
}
