//! Export fit results, residuals, scans and generated inputs.
//!
//! Result files come in two flavours selected by the output extension:
//!
//! - flat text with commented section headers (default)
//! - a JSON document (`*.json`) that also carries run metadata

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{FitOutcome, PhotonJetData, Residual, ResultsFile, ScanPoint};
use crate::error::{FitError, Result};

/// Write results as text or JSON depending on the extension of `path`.
pub fn write_results(path: &Path, results: &ResultsFile) -> Result<()> {
    if is_json_path(path) {
        write_results_json(path, results)
    } else {
        write_results_text(path, &results.fit)
    }
}

/// Write the flat text result format.
///
/// ```text
/// # Fitted parameters
/// v0 v1 ...
///
/// # Covariance matrix:
/// c00 c01 ...
/// ...
///
/// # Minimal chi^2, NDF, p-value:
/// min ndf p
/// ```
pub fn write_results_text(path: &Path, outcome: &FitOutcome) -> Result<()> {
    let mut out = BufWriter::new(create(path)?);
    out.write_all(format_results_text(outcome).as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Render the flat text result format.
pub fn format_results_text(outcome: &FitOutcome) -> String {
    let mut text = String::from("# Fitted parameters\n");
    for p in &outcome.parameters {
        text.push_str(&format!("{} ", p.value));
    }

    text.push_str("\n\n# Covariance matrix:\n");
    for row in &outcome.covariance_matrix {
        for v in row {
            text.push_str(&format!("{v} "));
        }
        text.push('\n');
    }

    text.push_str("\n# Minimal chi^2, NDF, p-value:\n");
    text.push_str(&format!(
        "{} {} {}\n",
        outcome.min_value, outcome.ndf, outcome.p_value
    ));
    text
}

/// Write the JSON result document.
pub fn write_results_json(path: &Path, results: &ResultsFile) -> Result<()> {
    let mut out = BufWriter::new(create(path)?);
    serde_json::to_writer_pretty(&mut out, results)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Write per-bin residuals as CSV `pt,residual,unc`.
pub fn write_residuals_csv(path: &Path, residuals: &[Residual]) -> Result<()> {
    let mut writer = csv_writer(path)?;
    writer.write_record(["pt", "residual", "unc"]).map_err(csv_error)?;
    for r in residuals {
        writer
            .write_record([fmt(r.pt), fmt(r.residual), fmt(r.unc)])
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write scan points as CSV `p0,p1,chi2`.
pub fn write_scan_csv(path: &Path, points: &[ScanPoint]) -> Result<()> {
    let mut writer = csv_writer(path)?;
    writer.write_record(["p0", "p1", "chi2"]).map_err(csv_error)?;
    for p in points {
        writer
            .write_record([fmt(p.p0), fmt(p.p1), fmt(p.chi2)])
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a photon+jet measurement in the ingest schema.
///
/// Both balance methods receive the same values, so the file can be fitted with
/// either `--method`.
pub fn write_photonjet_csv(path: &Path, data: &PhotonJetData) -> Result<()> {
    let mut writer = csv_writer(path)?;

    let mut header: Vec<String> = ["pt", "ptbal", "ptbal_unc", "mpf", "mpf_unc"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for syst in &data.systematics {
        header.push(format!("syst_{}_up", syst.name));
        header.push(format!("syst_{}_down", syst.name));
    }
    writer.write_record(&header).map_err(csv_error)?;

    for (i, bin) in data.bins.iter().enumerate() {
        let unc = bin.unc2.sqrt();
        let mut row = vec![
            fmt(bin.pt_photon),
            fmt(bin.balance_ratio),
            fmt(unc),
            fmt(bin.balance_ratio),
            fmt(unc),
        ];
        for syst in &data.systematics {
            let up = syst.up.get(i).copied().unwrap_or(0.0);
            let down = syst.down.get(i).copied().unwrap_or(0.0);
            row.push(fmt(up));
            row.push(fmt(down));
        }
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| FitError::data_source(path, format!("cannot create file: {e}")))
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    Ok(csv::Writer::from_writer(create(path)?))
}

fn csv_error(e: csv::Error) -> FitError {
    FitError::Io(std::io::Error::other(e))
}

fn fmt(v: f64) -> String {
    format!("{v:.10}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BalanceMethod, Contribution, CorrectionForm, FittedParameter, PtBin, SystematicShift};
    use crate::io::ingest::load_photonjet_csv;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("jecfit_export_{}_{nanos}_{name}", std::process::id()))
    }

    fn sample_outcome() -> FitOutcome {
        FitOutcome {
            status: 0,
            covariance_status: 3,
            min_value: 12.5,
            ndf: 10,
            p_value: 0.25,
            parameters: vec![
                FittedParameter { name: "p0".into(), value: 0.5, error: 0.1 },
                FittedParameter { name: "p1".into(), value: -0.25, error: 0.2 },
            ],
            covariance_matrix: vec![vec![0.01, 0.002], vec![0.002, 0.04]],
            contributions: vec![Contribution { label: "Constraint".into(), chi2: 12.5, ndf: 1 }],
            nuisance_penalty: 0.0,
            n_evaluations: 42,
            message: String::new(),
        }
    }

    #[test]
    fn text_format_has_three_sections() {
        let text = format_results_text(&sample_outcome());
        let expected = "# Fitted parameters\n0.5 -0.25 \n\n# Covariance matrix:\n0.01 0.002 \n0.002 0.04 \n\n# Minimal chi^2, NDF, p-value:\n12.5 10 0.25\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn json_extension_selects_json_output() {
        let path = temp_path("results.JSON");
        let results = ResultsFile {
            tool: "jecfit".into(),
            generated: chrono::Utc::now(),
            method: BalanceMethod::Mpf,
            corr_form: CorrectionForm::Std2P,
            constraint: Some("1.02,0.01".into()),
            fit: sample_outcome(),
        };
        write_results(&path, &results).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], 0);
        assert_eq!(value["covariance_status"], 3);
        assert_eq!(value["corr_form"], "2p");
        assert_eq!(value["method"], "mpf");
        assert_eq!(value["parameters"][1]["name"], "p1");

        let back: ResultsFile = serde_json::from_value(value).unwrap();
        assert_eq!(back.fit.parameters.len(), 2);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn photonjet_csv_reads_back() {
        let path = temp_path("pj.csv");
        let data = PhotonJetData {
            bins: vec![
                PtBin { pt_photon: 50.0, balance_ratio: 0.97, unc2: 1e-4 },
                PtBin { pt_photon: 120.0, balance_ratio: 0.98, unc2: 4e-4 },
            ],
            systematics: vec![SystematicShift {
                name: "fsr".into(),
                up: vec![0.01, 0.005],
                down: vec![-0.01, -0.005],
            }],
        };
        write_photonjet_csv(&path, &data).unwrap();

        let back = load_photonjet_csv(&path, BalanceMethod::PtBal).unwrap();
        assert_eq!(back.bins.len(), 2);
        assert!((back.bins[1].unc2 - 4e-4).abs() < 1e-12);
        assert_eq!(back.systematics[0].name, "fsr");
        assert!((back.systematics[0].down[0] + 0.01).abs() < 1e-12);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn residual_csv_has_header() {
        let path = temp_path("res.csv");
        write_residuals_csv(&path, &[Residual { pt: 100.0, residual: 0.01, unc: 0.02 }]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("pt,residual,unc\n"));
        assert_eq!(text.lines().count(), 2);
        let _ = std::fs::remove_file(path);
    }
}
