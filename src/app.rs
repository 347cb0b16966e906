//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` defaults and parses CLI arguments
//! - sets up logging
//! - dispatches to the fit, scan and generate commands
//! - prints reports and writes output files

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, GenerateArgs, MeasurementArgs, ScanArgs};
use crate::domain::{FitConfig, GenerateConfig, MeasurementConfig, ResultsFile, ScanConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `jecfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Fit(args) => handle_fit(&args),
        Command::Scan(args) => handle_scan(&args),
        Command::Generate(args) => handle_generate(&args),
    }
}

/// Log to stderr; `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Fails only when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(args);
    let run = pipeline::run_fit(&config)?;

    println!("{}", crate::report::format_fit_summary(&run.outcome, &config.measurements));

    if let Some(residuals) = &run.residuals {
        let ranking = crate::report::rank_pulls(residuals, args.top);
        println!("{}", crate::report::format_pull_ranking(&ranking));
    }

    let results = ResultsFile {
        tool: "jecfit".to_string(),
        generated: chrono::Utc::now(),
        method: config.measurements.method,
        corr_form: config.measurements.corr_form,
        constraint: config.measurements.constraint.clone(),
        fit: run.outcome,
    };
    crate::io::write_results(&config.output, &results)?;
    println!("Results saved to file \"{}\".", config.output.display());

    if let Some(path) = &config.residuals {
        match &run.residuals {
            Some(residuals) => {
                crate::io::write_residuals_csv(path, residuals)?;
                tracing::info!(path = %path.display(), "wrote residuals");
            }
            None => tracing::warn!("--residuals needs a photon+jet measurement; nothing written"),
        }
    }

    Ok(())
}

fn handle_scan(args: &ScanArgs) -> Result<(), AppError> {
    let config = ScanConfig {
        measurements: measurement_config_from_args(&args.measurements),
        p0_range: (args.p0_min, args.p0_max),
        p1_range: (args.p1_min, args.p1_max),
        steps: args.steps,
        output: args.output.clone(),
        max_iter: args.max_iter,
    };

    let points = pipeline::run_scan(&config)?;
    print!("{}", crate::report::format_scan_summary(&points));

    crate::io::write_scan_csv(&config.output, &points)?;
    println!("Scan saved to file \"{}\".", config.output.display());
    Ok(())
}

fn handle_generate(args: &GenerateArgs) -> Result<(), AppError> {
    let config = GenerateConfig {
        output: args.output.clone(),
        p0: args.p0,
        p1: args.p1,
        num_bins: args.bins,
        pt_min: args.pt_min,
        pt_max: args.pt_max,
        rel_unc: args.rel_unc,
        photon_scale: args.photon_scale,
        syst_size: args.syst_size,
        seed: args.seed,
    };

    let data = crate::data::generate_photonjet(&config)?;
    crate::io::write_photonjet_csv(&config.output, &data)?;
    println!(
        "Wrote {} bins to \"{}\".",
        data.bins.len(),
        config.output.display()
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        measurements: measurement_config_from_args(&args.measurements),
        output: args.output.clone(),
        residuals: args.residuals.clone(),
        max_iter: args.max_iter,
    }
}

pub fn measurement_config_from_args(args: &MeasurementArgs) -> MeasurementConfig {
    MeasurementConfig {
        photonjet: args.photonjet.clone(),
        method: args.method,
        corr_form: args.corr_form,
        constraint: args.constraint.clone(),
        exclude_syst: args.exclude_syst.clone(),
        pt_min: args.pt_min,
        pt_max: args.pt_max,
    }
}
