use crate::models::CorrectionModel;
use crate::nuisance::NuisanceValues;

/// A source of chi-square contributions for the combined fit.
///
/// Implementations hold immutable reference data loaded once at startup.
/// `eval` must be a pure function of its arguments: the minimizer calls it many
/// times and its convergence and error estimates assume a deterministic
/// objective.
pub trait Measurement: Send + Sync {
    /// Short label used in reports.
    fn label(&self) -> &str;

    /// Non-negative chi-square contribution for the given correction and nuisances.
    fn eval(&self, corrector: &dyn CorrectionModel, nuisances: &NuisanceValues<'_>) -> f64;

    /// Number of independent data points entering `eval`.
    fn dim(&self) -> usize;

    /// Degrees-of-freedom contribution to the combined statistic.
    fn ndf(&self) -> usize {
        self.dim()
    }
}
