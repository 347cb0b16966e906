//! CSV ingest of photon+jet balance measurements.
//!
//! Expected schema (header row required, column order free, names
//! case-insensitive):
//!
//! - `pt`: photon pt of the bin
//! - `ptbal`, `ptbal_unc`: pt balance ratio and its uncertainty
//! - `mpf`, `mpf_unc`: MPF ratio and its uncertainty
//! - `syst_<name>_up`, `syst_<name>_down` (optional, repeated): absolute shifts of
//!   the balance ratio under systematic `<name>`
//!
//! Only the columns of the requested balance method are required. Unlike a
//! loose import, any malformed row fails the whole load: a measurement is never
//! partially constructed.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{BalanceMethod, PhotonJetData, PtBin, SystematicShift};
use crate::error::{FitError, Result};

const SYST_PREFIX: &str = "syst_";

/// Load a photon+jet measurement for the given balance method.
pub fn load_photonjet_csv(path: &Path, method: BalanceMethod) -> Result<PhotonJetData> {
    let file = File::open(path).map_err(|e| FitError::data_source(path, e.to_string()))?;
    let data = parse_photonjet_csv(file, method).map_err(|message| FitError::data_source(path, message))?;

    tracing::info!(
        path = %path.display(),
        bins = data.bins.len(),
        systematics = data.systematics.len(),
        method = method.display_name(),
        "loaded photon+jet measurement"
    );
    Ok(data)
}

/// Parse photon+jet CSV content from any reader.
pub fn parse_photonjet_csv<R: Read>(
    reader: R,
    method: BalanceMethod,
) -> std::result::Result<PhotonJetData, String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| format!("Failed to read CSV headers: {e}"))?
        .clone();
    let header_map = build_header_map(&headers);

    let value_col = method.column().to_string();
    let unc_col = format!("{value_col}_unc");
    for required in ["pt", value_col.as_str(), unc_col.as_str()] {
        if !header_map.contains_key(required) {
            return Err(format!("Missing required column '{required}'."));
        }
    }

    let syst_names = systematic_names(&headers, &header_map)?;

    let mut data = PhotonJetData {
        bins: Vec::new(),
        systematics: syst_names
            .iter()
            .map(|name| SystematicShift {
                name: name.clone(),
                up: Vec::new(),
                down: Vec::new(),
            })
            .collect(),
    };

    for (idx, result) in reader.records().enumerate() {
        // Line numbers are 1-based and the header occupies line 1.
        let line = idx + 2;
        let record = result.map_err(|e| format!("CSV parse error at line {line}: {e}"))?;

        let pt = required_f64(&record, &header_map, "pt", line)?;
        let ratio = required_f64(&record, &header_map, &value_col, line)?;
        let unc = required_f64(&record, &header_map, &unc_col, line)?;
        if pt < 0.0 {
            return Err(format!("Negative pt {pt} at line {line}."));
        }
        if unc <= 0.0 {
            return Err(format!("Non-positive uncertainty {unc} at line {line}."));
        }

        data.bins.push(PtBin {
            pt_photon: pt,
            balance_ratio: ratio,
            unc2: unc * unc,
        });

        for syst in &mut data.systematics {
            let up_col = format!("{SYST_PREFIX}{}_up", syst.name);
            let down_col = format!("{SYST_PREFIX}{}_down", syst.name);
            syst.up.push(required_f64(&record, &header_map, &up_col, line)?);
            syst.down.push(required_f64(&record, &header_map, &down_col, line)?);
        }
    }

    if data.bins.is_empty() {
        return Err("No data rows found.".to_string());
    }
    if data.bins.windows(2).any(|w| w[1].pt_photon < w[0].pt_photon) {
        return Err("Bins must be ordered by increasing pt.".to_string());
    }

    Ok(data)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM that some spreadsheet exports prepend to the first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Systematic names in header order; each needs both an `_up` and a `_down` column.
fn systematic_names(
    headers: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> std::result::Result<Vec<String>, String> {
    let mut names = Vec::new();
    for header in headers.iter().map(normalize_header_name) {
        let Some(rest) = header.strip_prefix(SYST_PREFIX) else {
            continue;
        };
        let (name, partner) = if let Some(name) = rest.strip_suffix("_up") {
            (name, format!("{SYST_PREFIX}{name}_down"))
        } else if let Some(name) = rest.strip_suffix("_down") {
            (name, format!("{SYST_PREFIX}{name}_up"))
        } else {
            return Err(format!(
                "Systematic column '{header}' must end in '_up' or '_down'."
            ));
        };

        if name.is_empty() {
            return Err(format!("Systematic column '{header}' has an empty name."));
        }
        if !header_map.contains_key(&partner) {
            return Err(format!("Column '{header}' has no matching '{partner}'."));
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn required_f64(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
    line: usize,
) -> std::result::Result<f64, String> {
    let raw = header_map
        .get(name)
        .and_then(|idx| record.get(*idx))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing value for '{name}' at line {line}."))?;

    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid number '{raw}' for '{name}' at line {line}."))?;
    if !value.is_finite() {
        return Err(format!("Non-finite value for '{name}' at line {line}."));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
pt,ptbal,ptbal_unc,mpf,mpf_unc,syst_fsr_up,syst_fsr_down
40,0.97,0.01,0.98,0.008,0.004,-0.003
85,0.98,0.005,0.985,0.004,0.002,-0.002
300,0.99,0.004,0.992,0.003,0.001,-0.001
";

    #[test]
    fn parses_selected_method_and_systematics() {
        let data = parse_photonjet_csv(SAMPLE.as_bytes(), BalanceMethod::Mpf).unwrap();
        assert_eq!(data.bins.len(), 3);
        assert_eq!(data.bins[1].pt_photon, 85.0);
        assert_eq!(data.bins[1].balance_ratio, 0.985);
        assert!((data.bins[1].unc2 - 1.6e-5).abs() < 1e-15);

        assert_eq!(data.systematics.len(), 1);
        assert_eq!(data.systematics[0].name, "fsr");
        assert_eq!(data.systematics[0].up, vec![0.004, 0.002, 0.001]);
        assert_eq!(data.systematics[0].down, vec![-0.003, -0.002, -0.001]);
    }

    #[test]
    fn headers_are_case_insensitive() {
        let csv = "\u{feff}PT,PtBal,PTBAL_UNC\n100,0.95,0.01\n";
        let data = parse_photonjet_csv(csv.as_bytes(), BalanceMethod::PtBal).unwrap();
        assert_eq!(data.bins.len(), 1);
        assert!(data.systematics.is_empty());
    }

    #[test]
    fn missing_method_columns_fail() {
        let csv = "pt,ptbal,ptbal_unc\n100,0.95,0.01\n";
        let err = parse_photonjet_csv(csv.as_bytes(), BalanceMethod::Mpf).unwrap_err();
        assert!(err.contains("mpf"), "{err}");
    }

    #[test]
    fn malformed_row_fails_whole_load() {
        let csv = "pt,ptbal,ptbal_unc\n100,0.95,0.01\n200,abc,0.01\n";
        let err = parse_photonjet_csv(csv.as_bytes(), BalanceMethod::PtBal).unwrap_err();
        assert!(err.contains("line 3"), "{err}");
    }

    #[test]
    fn unpaired_systematic_fails() {
        let csv = "pt,ptbal,ptbal_unc,syst_jer_up\n100,0.95,0.01,0.01\n";
        assert!(parse_photonjet_csv(csv.as_bytes(), BalanceMethod::PtBal).is_err());
    }

    #[test]
    fn missing_file_is_data_source_error() {
        let err = load_photonjet_csv(Path::new("/nonexistent/photonjet.csv"), BalanceMethod::PtBal)
            .unwrap_err();
        assert!(matches!(err, FitError::DataSource { .. }));
    }
}
