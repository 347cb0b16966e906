//! Formatted terminal output for fit runs.
//!
//! We keep formatting code in one place so the fitting code stays clean and
//! output changes are localized.

use crate::domain::{FitOutcome, MeasurementConfig, Residual, ScanPoint};
use crate::report::PullRanking;

/// Format the fit summary: run setup, quality flags, parameters, and chi-square breakdown.
pub fn format_fit_summary(outcome: &FitOutcome, config: &MeasurementConfig) -> String {
    let mut out = String::new();

    out.push_str("=== jecfit - combined jet correction fit ===\n");
    out.push_str(&format!(
        "Correction: {:?} | method: {}\n",
        config.corr_form,
        config.method.display_name()
    ));
    if let Some(constraint) = &config.constraint {
        out.push_str(&format!("Constraint: {constraint}\n"));
    }
    out.push_str(&format!("pt range: [{}, {}]\n", config.pt_min, config.pt_max));

    out.push_str("\nSummary:\n");
    out.push_str(&format!("  Status: {}\n", outcome.status));
    out.push_str(&format!("  Covariance matrix status: {}\n", outcome.covariance_status));
    out.push_str(&format!("  Minimal value: {:.6}\n", outcome.min_value));
    out.push_str(&format!("  NDF: {}\n", outcome.ndf));
    out.push_str(&format!("  p-value: {}\n", fmt_p_value(outcome.p_value)));
    out.push_str(&format!("  Evaluations: {}\n", outcome.n_evaluations));
    if outcome.status != 0 {
        out.push_str(&format!("  Minimizer: {}\n", outcome.message));
    }

    out.push_str("  Parameters:\n");
    let width = outcome
        .parameters
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(0);
    for p in &outcome.parameters {
        out.push_str(&format!(
            "    {:<width$}  {:>12.6} +- {:.6}\n",
            p.name, p.value, p.error
        ));
    }

    out.push_str("  Contributions:\n");
    for c in &outcome.contributions {
        out.push_str(&format!("    {:<24} chi2={:>10.4} ndf={}\n", c.label, c.chi2, c.ndf));
    }
    out.push_str(&format!(
        "    {:<24} chi2={:>10.4}\n",
        "Nuisance penalty", outcome.nuisance_penalty
    ));

    out
}

/// Format the bins with the largest pulls on each side.
pub fn format_pull_ranking(ranking: &PullRanking) -> String {
    let mut out = String::new();

    out.push_str("Largest positive pulls:\n");
    out.push_str(&format_residual_table(&ranking.high));
    out.push('\n');

    out.push_str("Largest negative pulls:\n");
    out.push_str(&format_residual_table(&ranking.low));

    out
}

/// Format the minimum of a profile scan.
pub fn format_scan_summary(points: &[ScanPoint]) -> String {
    let best = points
        .iter()
        .filter(|p| p.chi2.is_finite())
        .min_by(|a, b| a.chi2.total_cmp(&b.chi2));
    let failed = points.iter().filter(|p| !p.chi2.is_finite()).count();

    let mut out = format!("Scan points: {} ({failed} failed)\n", points.len());
    match best {
        Some(p) => out.push_str(&format!(
            "Minimum: chi2={:.4} at p0={:.6}, p1={:.6}\n",
            p.chi2, p.p0, p.p1
        )),
        None => out.push_str("Minimum: none (no finite points)\n"),
    }
    out
}

fn format_residual_table(rows: &[Residual]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>10} {:>12} {:>10} {:>8}\n", "pt", "residual", "unc", "pull"));
    out.push_str(&format!("{:->10} {:->12} {:->10} {:->8}\n", "", "", "", ""));
    for r in rows {
        out.push_str(&format!(
            "{:>10.2} {:>12.6} {:>10.6} {:>8.3}\n",
            r.pt,
            r.residual,
            r.unc,
            r.residual / r.unc
        ));
    }
    out
}

fn fmt_p_value(p: f64) -> String {
    if p.is_nan() {
        "n/a".to_string()
    } else {
        format!("{p:.6}")
    }
}
