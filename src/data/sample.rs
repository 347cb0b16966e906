//! Synthetic photon+jet pseudo-data generated from a known correction.
//!
//! Bins are log-spaced in photon pt. For a true correction `C` and a true
//! photon energy scale shift `s`, the expected measured balance ratio is
//!
//! ```text
//! ratio(pt) = (1 + s) / C(pt (1 + s))
//! ```
//!
//! which is exactly what the photon+jet measurement inverts when its
//! `photon_scale` nuisance equals `s`. Each bin is smeared with Gaussian noise
//! of relative width `rel_unc`.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{GenerateConfig, PhotonJetData, PtBin, SystematicShift};
use crate::error::{FitError, Result};
use crate::math::log_space;
use crate::models::{CorrectionModel, Std2P};

/// Name of the generated systematic column pair.
pub const GENERATED_SYST: &str = "shape";

pub fn generate_photonjet(config: &GenerateConfig) -> Result<PhotonJetData> {
    if config.num_bins == 0 {
        return Err(FitError::Config("Number of bins must be > 0.".to_string()));
    }
    if !(config.pt_min.is_finite() && config.pt_min > 0.0 && config.pt_max > config.pt_min) {
        return Err(FitError::Config(format!(
            "Invalid pt range [{}, {}] for generation.",
            config.pt_min, config.pt_max
        )));
    }
    if !(config.rel_unc.is_finite() && config.rel_unc > 0.0) {
        return Err(FitError::Config("Relative uncertainty must be > 0.".to_string()));
    }
    if !(config.photon_scale.is_finite() && config.photon_scale > -1.0) {
        return Err(FitError::Config("Photon scale shift must be > -1.".to_string()));
    }
    if !(config.syst_size.is_finite() && config.syst_size >= 0.0) {
        return Err(FitError::Config("Systematic size must be >= 0.".to_string()));
    }

    let truth = Std2P::new(config.p0, config.p1);
    let pts = if config.num_bins == 1 {
        vec![config.pt_min]
    } else {
        log_space(config.pt_min, config.pt_max, config.num_bins)?
    };

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| FitError::Numerical(format!("Noise distribution error: {e}")))?;

    let scale = 1.0 + config.photon_scale;
    let log_span = (config.pt_max / config.pt_min).ln().max(f64::MIN_POSITIVE);

    let mut bins = Vec::with_capacity(pts.len());
    let mut up = Vec::with_capacity(pts.len());
    for &pt in &pts {
        let corr = truth.eval(pt * scale);
        if !(corr.is_finite() && corr > 0.0) {
            return Err(FitError::Config(format!(
                "Truth correction {corr} at pt={pt} is not positive."
            )));
        }

        let expected = scale / corr;
        let unc = config.rel_unc * expected;
        let z: f64 = normal.sample(&mut rng);
        bins.push(PtBin {
            pt_photon: pt,
            balance_ratio: expected + unc * z,
            unc2: unc * unc,
        });

        // Shape variation that fades out towards high pt.
        let fade = 1.0 - (pt / config.pt_min).ln() / log_span;
        up.push(config.syst_size * expected * fade.max(0.0));
    }

    let systematics = if config.syst_size > 0.0 {
        vec![SystematicShift {
            name: GENERATED_SYST.to_string(),
            down: up.iter().map(|v| -v).collect(),
            up,
        }]
    } else {
        Vec::new()
    };

    tracing::info!(
        bins = bins.len(),
        p0 = config.p0,
        p1 = config.p1,
        seed = config.seed,
        "generated photon+jet pseudo-data"
    );
    Ok(PhotonJetData { bins, systematics })
}
