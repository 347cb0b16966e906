//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - built from CLI flags and input files
//! - passed through the fit pipeline
//! - exported to text/JSON result files

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};

/// Balance variable used by the photon+jet measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BalanceMethod {
    /// pt balance between the jet and the photon.
    #[value(name = "ptbal")]
    PtBal,
    /// Missing transverse momentum projection fraction.
    Mpf,
}

impl BalanceMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            BalanceMethod::PtBal => "PtBal",
            BalanceMethod::Mpf => "MPF",
        }
    }

    /// Column prefix of this method in measurement CSV files.
    pub fn column(self) -> &'static str {
        match self {
            BalanceMethod::PtBal => "ptbal",
            BalanceMethod::Mpf => "mpf",
        }
    }
}

/// Functional form of the fitted correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum CorrectionForm {
    /// `1 + p0 + p1 ln(pt/208)`.
    #[serde(rename = "2p")]
    #[value(name = "2p")]
    Std2P,
    /// Linear spline in ln(pt) with 5 nodes between 30 and 1500 GeV.
    #[serde(rename = "spline")]
    Spline,
}

/// One pt bin of a balance measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PtBin {
    /// Reference (photon) pt of the bin.
    pub pt_photon: f64,
    /// Measured jet/photon balance ratio.
    pub balance_ratio: f64,
    /// Squared uncertainty of the balance ratio.
    pub unc2: f64,
}

/// A systematic variation given as absolute up/down shifts of the balance ratio per bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SystematicShift {
    pub name: String,
    pub up: Vec<f64>,
    pub down: Vec<f64>,
}

/// Parsed photon+jet input: bins plus their systematic variations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotonJetData {
    pub bins: Vec<PtBin>,
    pub systematics: Vec<SystematicShift>,
}

/// Minimizer setup of a single entry of the parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub init: f64,
    pub step: f64,
    pub lower: f64,
    pub upper: f64,
    /// Fixed parameters stay at `init` and are not varied by the minimizer.
    pub fixed: bool,
}

impl ParameterSpec {
    pub fn free(name: impl Into<String>, init: f64, step: f64, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            init,
            step,
            lower,
            upper,
            fixed: false,
        }
    }

    pub fn fix_at(&mut self, value: f64) {
        self.init = value;
        self.fixed = true;
    }
}

/// A fitted parameter with its uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParameter {
    pub name: String,
    pub value: f64,
    pub error: f64,
}

/// Chi-square contribution of one measurement at the best-fit point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub label: String,
    pub chi2: f64,
    pub ndf: usize,
}

/// Outcome of a full fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOutcome {
    /// 0 when the minimizer converged, 1 otherwise.
    pub status: i32,
    /// 0: unavailable, 1: diagonal approximation, 2: forced positive-definite, 3: accurate.
    pub covariance_status: i32,
    pub min_value: f64,
    pub ndf: i64,
    /// NaN when `ndf <= 0`; written as `null` in JSON.
    #[serde(deserialize_with = "null_as_nan")]
    pub p_value: f64,
    pub parameters: Vec<FittedParameter>,
    /// Row-major `n x n` covariance matrix.
    pub covariance_matrix: Vec<Vec<f64>>,
    pub contributions: Vec<Contribution>,
    pub nuisance_penalty: f64,
    pub n_evaluations: usize,
    pub message: String,
}

/// Per-bin residual of a balance measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Residual {
    pub pt: f64,
    pub residual: f64,
    pub unc: f64,
}

/// One point of a profiled chi-square scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    pub p0: f64,
    pub p1: f64,
    pub chi2: f64,
}

/// Inputs shared by every command that assembles measurements.
#[derive(Debug, Clone)]
pub struct MeasurementConfig {
    pub photonjet: Option<PathBuf>,
    pub method: BalanceMethod,
    pub corr_form: CorrectionForm,
    pub constraint: Option<String>,
    pub exclude_syst: Vec<String>,
    pub pt_min: f64,
    pub pt_max: f64,
}

/// A full `fit` run's configuration as understood by the pipeline.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub measurements: MeasurementConfig,
    pub output: PathBuf,
    pub residuals: Option<PathBuf>,
    pub max_iter: u64,
}

/// Configuration of a profiled chi-square scan over `(p0, p1)`.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub measurements: MeasurementConfig,
    pub p0_range: (f64, f64),
    pub p1_range: (f64, f64),
    pub steps: usize,
    pub output: PathBuf,
    pub max_iter: u64,
}

/// Configuration of pseudo-data generation.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub output: PathBuf,
    pub p0: f64,
    pub p1: f64,
    pub num_bins: usize,
    pub pt_min: f64,
    pub pt_max: f64,
    /// Relative statistical uncertainty of each balance point.
    pub rel_unc: f64,
    /// True photon energy scale shift applied to the generated data.
    pub photon_scale: f64,
    /// Relative size of the generated symmetric systematic variation.
    pub syst_size: f64,
    pub seed: u64,
}

/// JSON result document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub generated: chrono::DateTime<chrono::Utc>,
    pub method: BalanceMethod,
    pub corr_form: CorrectionForm,
    pub constraint: Option<String>,
    #[serde(flatten)]
    pub fit: FitOutcome,
}

fn null_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
