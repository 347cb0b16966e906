//! Photon+jet balance measurement.
//!
//! Each pt bin provides the measured jet/photon balance ratio at a photon pt.
//! Assuming the jet pt equals the photon pt, a perfect correction `C` satisfies
//! `ratio = 1 / C(pt)`. The photon energy scale nuisance `s` shifts the photon
//! pt, which rescales both the observed ratio and the point at which `C` is
//! evaluated:
//!
//! ```text
//! ratio' = ratio / (1 + s)
//! pt'    = pt * (1 + s)
//! chi2   = Σ (ratio' - 1 / C(pt'))^2 / unc^2
//! ```
//!
//! Optional systematic variations add a morphed absolute shift to the ratio
//! before the scale correction.

use std::path::Path;

use crate::domain::{BalanceMethod, PhotonJetData, PtBin, Residual};
use crate::error::{FitError, Result};
use crate::io::ingest::load_photonjet_csv;
use crate::math::SmoothMorph;
use crate::measurements::Measurement;
use crate::models::CorrectionModel;
use crate::nuisance::{NuisanceId, NuisanceRegistry, NuisanceValues};

/// Name of the photon energy scale nuisance.
pub const PHOTON_SCALE: &str = "photon_scale";

/// Default pt range used in the fit.
pub const DEFAULT_PT_RANGE: (f64, f64) = (0.0, 1600.0);

#[derive(Debug, Clone)]
struct MorphedSystematic {
    nuisance: NuisanceId,
    morph: SmoothMorph,
}

#[derive(Debug, Clone)]
pub struct PhotonJet {
    label: String,
    bins: Vec<PtBin>,
    systematics: Vec<MorphedSystematic>,
    photon_scale: NuisanceId,
    /// Indices of bins inside the selected pt range.
    selected: Vec<usize>,
}

impl PhotonJet {
    /// Build the measurement and register its nuisances.
    ///
    /// Systematics whose names appear in `exclude_syst` are dropped.
    pub fn new(
        data: PhotonJetData,
        method: BalanceMethod,
        registry: &mut NuisanceRegistry,
        exclude_syst: &[String],
    ) -> Result<Self> {
        if data.bins.is_empty() {
            return Err(FitError::Config(
                "photon+jet measurement contains no bins".to_string(),
            ));
        }
        if let Some(bin) = data
            .bins
            .iter()
            .find(|b| !(b.unc2.is_finite() && b.unc2 > 0.0 && b.pt_photon.is_finite()))
        {
            return Err(FitError::Config(format!(
                "photon+jet bin at pt={} has invalid uncertainty^2 {}",
                bin.pt_photon, bin.unc2
            )));
        }

        let photon_scale = registry.register(PHOTON_SCALE);

        let mut systematics = Vec::new();
        for syst in data.systematics {
            if exclude_syst.iter().any(|name| *name == syst.name) {
                tracing::debug!(syst = %syst.name, "excluding systematic");
                continue;
            }
            if syst.up.len() != data.bins.len() {
                return Err(FitError::Precondition(format!(
                    "systematic '{}' has {} bins, measurement has {}",
                    syst.name,
                    syst.up.len(),
                    data.bins.len()
                )));
            }

            let morph = SmoothMorph::from_up_down(syst.up, syst.down)?;
            let nuisance = registry.register(syst.name);
            systematics.push(MorphedSystematic { nuisance, morph });
        }

        let mut measurement = Self {
            label: format!("PhotonJet ({})", method.display_name()),
            bins: data.bins,
            systematics,
            photon_scale,
            selected: Vec::new(),
        };
        measurement.set_pt_range(DEFAULT_PT_RANGE.0, DEFAULT_PT_RANGE.1);
        Ok(measurement)
    }

    /// Load from a CSV file (see [`load_photonjet_csv`]) and build the measurement.
    pub fn from_csv(
        path: &Path,
        method: BalanceMethod,
        registry: &mut NuisanceRegistry,
        exclude_syst: &[String],
    ) -> Result<Self> {
        let data = load_photonjet_csv(path, method)?;
        Self::new(data, method, registry, exclude_syst)
    }

    /// Restrict the fit to bins with photon pt in `[min_pt, max_pt]`.
    pub fn set_pt_range(&mut self, min_pt: f64, max_pt: f64) {
        self.selected = self
            .bins
            .iter()
            .enumerate()
            .filter(|(_, b)| b.pt_photon >= min_pt && b.pt_photon <= max_pt)
            .map(|(i, _)| i)
            .collect();
    }

    /// Per-bin balance ratios after applying the morphed systematic shifts.
    fn shifted_ratios(&self, nuisances: &NuisanceValues<'_>) -> Vec<f64> {
        let mut ratios: Vec<f64> = self.bins.iter().map(|b| b.balance_ratio).collect();
        for syst in &self.systematics {
            let pull = nuisances.get(syst.nuisance);
            for (ratio, shift) in ratios.iter_mut().zip(syst.morph.eval_all(pull)) {
                *ratio += shift;
            }
        }
        ratios
    }

    /// Data-to-correction residuals for the selected bins, at the scale-corrected pt.
    pub fn residuals(
        &self,
        corrector: &dyn CorrectionModel,
        nuisances: &NuisanceValues<'_>,
    ) -> Vec<Residual> {
        let scale = 1.0 + nuisances.get(self.photon_scale);
        let ratios = self.shifted_ratios(nuisances);

        self.selected
            .iter()
            .map(|&i| {
                let bin = &self.bins[i];
                let pt = bin.pt_photon * scale;
                Residual {
                    pt,
                    residual: ratios[i] / scale - 1.0 / corrector.eval(pt),
                    unc: bin.unc2.sqrt(),
                }
            })
            .collect()
    }
}

impl Measurement for PhotonJet {
    fn label(&self) -> &str {
        &self.label
    }

    fn eval(&self, corrector: &dyn CorrectionModel, nuisances: &NuisanceValues<'_>) -> f64 {
        let scale = 1.0 + nuisances.get(self.photon_scale);
        let ratios = self.shifted_ratios(nuisances);

        let mut chi2 = 0.0;
        for &i in &self.selected {
            let bin = &self.bins[i];
            let ratio = ratios[i] / scale;
            let pt = bin.pt_photon * scale;
            chi2 += (ratio - 1.0 / corrector.eval(pt)).powi(2) / bin.unc2;
        }
        chi2
    }

    fn dim(&self) -> usize {
        self.selected.len()
    }
}
