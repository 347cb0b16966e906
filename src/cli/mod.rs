//! Command-line parsing for the combined jet correction fit.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code. Every option can also be supplied through a
//! `JECFIT_*` environment variable (or a `.env` file in the working directory).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{BalanceMethod, CorrectionForm};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "jecfit", version, about = "Combined jet energy correction fit")]
pub struct Cli {
    /// Log level used when `RUST_LOG` is not set (error, warn, info, debug, trace).
    #[arg(long, global = true, env = "JECFIT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the correction to the requested measurements and save the results.
    Fit(FitArgs),
    /// Profile the chi-square on a grid of (p0, p1) values.
    Scan(ScanArgs),
    /// Write a pseudo-data photon+jet CSV from a known correction.
    Generate(GenerateArgs),
}

/// Options selecting and configuring the measurements.
#[derive(Debug, Args, Clone)]
pub struct MeasurementArgs {
    /// Photon+jet balance measurement (CSV).
    #[arg(long, value_name = "CSV", env = "JECFIT_PHOTONJET")]
    pub photonjet: Option<PathBuf>,

    /// Balance variable read from the photon+jet input.
    #[arg(long, value_enum, ignore_case = true, default_value_t = BalanceMethod::PtBal, env = "JECFIT_METHOD")]
    pub method: BalanceMethod,

    /// Functional form of the correction.
    #[arg(long = "corr", value_enum, ignore_case = true, default_value_t = CorrectionForm::Std2P, env = "JECFIT_CORR")]
    pub corr_form: CorrectionForm,

    /// Constraint on the correction: "target,rel_unc" (at pt 208) or "pt,target,rel_unc".
    #[arg(long, value_name = "TEXT", env = "JECFIT_CONSTRAINT")]
    pub constraint: Option<String>,

    /// Systematic variations to leave out of the photon+jet measurement.
    #[arg(long = "exclude-syst", value_name = "NAME", num_args = 1.., value_delimiter = ',')]
    pub exclude_syst: Vec<String>,

    /// Lower photon pt bound of the bins used in the fit.
    #[arg(long, default_value_t = 0.0, env = "JECFIT_PT_MIN")]
    pub pt_min: f64,

    /// Upper photon pt bound of the bins used in the fit.
    #[arg(long, default_value_t = 1600.0, env = "JECFIT_PT_MAX")]
    pub pt_max: f64,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub measurements: MeasurementArgs,

    /// Result file; a `.json` extension selects the JSON format.
    #[arg(short, long, default_value = "fit.out", env = "JECFIT_OUTPUT")]
    pub output: PathBuf,

    /// Write photon+jet residuals at the best fit to this CSV.
    #[arg(long, value_name = "CSV")]
    pub residuals: Option<PathBuf>,

    /// Show the N bins with the largest pulls on each side.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Maximum number of minimizer iterations.
    #[arg(long, default_value_t = 1000, env = "JECFIT_MAX_ITER")]
    pub max_iter: u64,
}

#[derive(Debug, Args, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub measurements: MeasurementArgs,

    #[arg(long, default_value_t = -0.1, allow_hyphen_values = true)]
    pub p0_min: f64,

    #[arg(long, default_value_t = 0.1, allow_hyphen_values = true)]
    pub p0_max: f64,

    #[arg(long, default_value_t = -0.1, allow_hyphen_values = true)]
    pub p1_min: f64,

    #[arg(long, default_value_t = 0.1, allow_hyphen_values = true)]
    pub p1_max: f64,

    /// Grid points per axis.
    #[arg(long, default_value_t = 21)]
    pub steps: usize,

    /// Scan output (CSV `p0,p1,chi2`).
    #[arg(short, long, default_value = "scan.csv")]
    pub output: PathBuf,

    /// Maximum number of minimizer iterations per grid point.
    #[arg(long, default_value_t = 500, env = "JECFIT_MAX_ITER")]
    pub max_iter: u64,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// Output CSV.
    #[arg(short, long, default_value = "photonjet.csv")]
    pub output: PathBuf,

    /// True offset of the 2p correction.
    #[arg(long, default_value_t = 0.02, allow_hyphen_values = true)]
    pub p0: f64,

    /// True log slope of the 2p correction.
    #[arg(long, default_value_t = -0.01, allow_hyphen_values = true)]
    pub p1: f64,

    #[arg(long, default_value_t = 20)]
    pub bins: usize,

    #[arg(long, default_value_t = 40.0)]
    pub pt_min: f64,

    #[arg(long, default_value_t = 1500.0)]
    pub pt_max: f64,

    /// Relative statistical uncertainty per bin.
    #[arg(long, default_value_t = 0.005)]
    pub rel_unc: f64,

    /// True photon energy scale shift.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub photon_scale: f64,

    /// Relative size of the generated systematic variation (0 disables it).
    #[arg(long, default_value_t = 0.005)]
    pub syst_size: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
