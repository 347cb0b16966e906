use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_jecfit"))
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("jecfit_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .current_dir(std::env::temp_dir())
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn generate(path: &Path) {
    let out = run(&[
        "generate",
        "--output",
        path.to_str().unwrap(),
        "--p0",
        "0.02",
        "--p1",
        "-0.01",
        "--bins",
        "15",
        "--rel-unc",
        "0.002",
        "--seed",
        "11",
    ]);
    assert!(
        out.status.success(),
        "generate should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
}

#[test]
fn generate_then_fit_json() {
    let input = tmp_path("photonjet.csv");
    let output = tmp_path("fit.json");
    generate(&input);

    let out = run(&[
        "fit",
        "--photonjet",
        input.to_str().unwrap(),
        "--method",
        "PtBal",
        "--constraint",
        "1.02,0.05",
        "--output",
        output.to_str().unwrap(),
        "--log-level",
        "warn",
    ]);
    assert!(
        out.status.success(),
        "fit should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Covariance matrix status"), "unexpected stdout: {stdout}");

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(v["tool"], "jecfit");
    assert_eq!(v["method"], "ptbal");
    assert_eq!(v["corr_form"], "2p");
    assert_eq!(v["constraint"], "1.02,0.05");
    assert_eq!(v["ndf"], 14);

    let params = v["parameters"].as_array().unwrap();
    let names: Vec<&str> = params.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["p0", "p1", "photon_scale", "shape"]);
    assert_eq!(v["covariance_matrix"].as_array().unwrap().len(), 4);

    // The photon scale is nearly degenerate with p0, so only require the
    // generated truth to lie within the reported uncertainties.
    for (param, truth) in params.iter().zip([0.02, -0.01]) {
        let value = param["value"].as_f64().unwrap();
        let error = param["error"].as_f64().unwrap();
        assert!(error > 0.0, "{param}");
        assert!((value - truth).abs() < 3.0 * error, "{param} vs truth {truth}");
    }

    let p_value = v["p_value"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p_value));

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
}

#[test]
fn fit_writes_text_results_and_residuals() {
    let input = tmp_path("photonjet_text.csv");
    let output = tmp_path("fit.out");
    let residuals = tmp_path("residuals.csv");
    generate(&input);

    let out = run(&[
        "fit",
        "--photonjet",
        input.to_str().unwrap(),
        "--exclude-syst",
        "shape",
        "--pt-max",
        "500",
        "--output",
        output.to_str().unwrap(),
        "--residuals",
        residuals.to_str().unwrap(),
    ]);
    assert!(
        out.status.success(),
        "fit should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "# Fitted parameters");
    assert_eq!(lines[1].split_whitespace().count(), 3);
    assert_eq!(lines[3], "# Covariance matrix:");
    assert!(text.contains("# Minimal chi^2, NDF, p-value:"));

    let values: Vec<f64> = lines[1].split_whitespace().map(|v| v.parse().unwrap()).collect();
    let scale = 1.0 + values[2];

    let bin_pts: Vec<f64> = std::fs::read_to_string(&input)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap().parse::<f64>().unwrap())
        .filter(|&pt| pt <= 500.0)
        .collect();

    let res = std::fs::read_to_string(&residuals).unwrap();
    assert!(res.starts_with("pt,residual,unc"));
    let residual_pts: Vec<f64> = res
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(residual_pts.len(), bin_pts.len());
    for (pt, bin_pt) in residual_pts.iter().zip(&bin_pts) {
        let expected = bin_pt * scale;
        assert!((pt - expected).abs() <= 1e-6 * expected.abs(), "{pt} vs {expected}");
    }

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
    let _ = std::fs::remove_file(residuals);
}

#[test]
fn scan_writes_grid() {
    let input = tmp_path("photonjet_scan.csv");
    let output = tmp_path("scan.csv");
    generate(&input);

    let out = run(&[
        "scan",
        "--photonjet",
        input.to_str().unwrap(),
        "--p0-min",
        "0.0",
        "--p0-max",
        "0.04",
        "--p1-min",
        "-0.03",
        "--p1-max",
        "0.01",
        "--steps",
        "3",
        "--output",
        output.to_str().unwrap(),
    ]);
    assert!(
        out.status.success(),
        "scan should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "p0,p1,chi2");
    assert_eq!(lines.len(), 10);

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
}

#[test]
fn no_measurements_is_config_error() {
    let out = run(&["fit", "--output", tmp_path("unused.out").to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("No measurements requested."), "stderr={stderr}");
}

#[test]
fn malformed_constraint_is_config_error() {
    let out = run(&["fit", "--constraint", "abc"]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Failed to parse constraint \"abc\"."), "stderr={stderr}");
}

#[test]
fn missing_input_is_data_error() {
    let missing = tmp_path("does_not_exist.csv");
    let out = run(&["fit", "--photonjet", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
}
