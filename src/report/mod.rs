//! Reporting utilities: pull rankings and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::Residual;

/// Bins with the largest pulls on each side (top-N each).
#[derive(Debug, Clone)]
pub struct PullRanking {
    pub high: Vec<Residual>,
    pub low: Vec<Residual>,
}

/// Rank residuals by pull `residual / unc`.
pub fn rank_pulls(residuals: &[Residual], top_n: usize) -> PullRanking {
    let pull = |r: &Residual| r.residual / r.unc;

    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| pull(b).total_cmp(&pull(a)));
    let high = sorted.iter().take(top_n).filter(|r| pull(*r) > 0.0).copied().collect();
    let low = sorted.iter().rev().take(top_n).filter(|r| pull(*r) < 0.0).copied().collect();

    PullRanking { high, low }
}
