//! Bounded minimization of a scalar objective.
//!
//! [`LbfgsMinimizer`] runs `argmin`'s L-BFGS with a More-Thuente line search
//! over the free parameters only. The solver works in step units: free
//! parameter `k` is `x_k = init_k + step_k * u_k`, and the objective is divided
//! by the norm of its step-unit gradient at the start point. The first line
//! search therefore starts with a move of one step, whatever the scale of the
//! objective.
//!
//! Box bounds are enforced by clamping every evaluation point; gradients are
//! central differences projected so that they never push a parameter sitting
//! on a bound further outside. A result with a free parameter on a bound is
//! reported as not converged.

use std::sync::atomic::{AtomicUsize, Ordering};

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

use crate::domain::ParameterSpec;
use crate::error::{FitError, Result};

/// A scalar function of a flat parameter vector.
pub trait Objective: Send + Sync {
    fn num_params(&self) -> usize;

    fn eval(&self, params: &[f64]) -> Result<f64>;
}

/// Result of one minimization.
#[derive(Debug, Clone)]
pub struct MinimizerOutcome {
    /// Best point, full length (fixed parameters included).
    pub x: Vec<f64>,
    pub min_value: f64,
    /// 0 when converged inside the bounds, 1 otherwise.
    pub status: i32,
    pub n_evals: usize,
    pub message: String,
}

impl MinimizerOutcome {
    pub fn converged(&self) -> bool {
        self.status == 0
    }
}

pub trait Minimizer: Send + Sync {
    fn minimize(&self, objective: &dyn Objective, specs: &[ParameterSpec]) -> Result<MinimizerOutcome>;
}

/// L-BFGS with box constraints via clamping.
#[derive(Debug, Clone)]
pub struct LbfgsMinimizer {
    pub max_iter: u64,
    /// Convergence tolerance on the gradient norm in step units.
    pub tol: f64,
    /// History length of the inverse Hessian approximation.
    pub m: usize,
}

impl Default for LbfgsMinimizer {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-6,
            m: 10,
        }
    }
}

impl LbfgsMinimizer {
    pub fn with_max_iter(max_iter: u64) -> Self {
        Self {
            max_iter,
            ..Self::default()
        }
    }
}

impl Minimizer for LbfgsMinimizer {
    fn minimize(&self, objective: &dyn Objective, specs: &[ParameterSpec]) -> Result<MinimizerOutcome> {
        if specs.len() != objective.num_params() {
            return Err(FitError::Precondition(format!(
                "{} parameter specs for an objective of {} parameters",
                specs.len(),
                objective.num_params()
            )));
        }
        if let Some(bad) = specs.iter().find(|s| {
            !(s.lower <= s.upper) || !s.init.is_finite() || (!s.fixed && !(s.step.is_finite() && s.step > 0.0))
        }) {
            return Err(FitError::Config(format!(
                "parameter '{}' has invalid setup: init={}, step={}, bounds=[{}, {}]",
                bad.name, bad.init, bad.step, bad.lower, bad.upper
            )));
        }

        let mut problem = FreeProblem::new(objective, specs);

        if problem.free.is_empty() {
            let x = problem.expand(&[]);
            let min_value = objective.eval(&x)?;
            return Ok(MinimizerOutcome {
                x,
                min_value,
                status: 0,
                n_evals: 1,
                message: "no free parameters".to_string(),
            });
        }

        let init = vec![0.0; problem.free.len()];
        let start_norm = problem.step_gradient(&init)?.iter().map(|g| g * g).sum::<f64>().sqrt();
        if start_norm.is_finite() && start_norm > 0.0 {
            problem.cost_scale = start_norm;
        }

        // Argmin's default cost tolerance is close to machine epsilon, far too strict
        // for chi-square scales. Both tolerances refer to the unscaled objective.
        let tol_grad = self.tol / problem.cost_scale;
        let tol_cost = if self.tol == 0.0 {
            0.0
        } else {
            (0.1 * self.tol).max(1e-12) / problem.cost_scale
        };
        let solver = LBFGS::new(MoreThuenteLineSearch::new(), self.m)
            .with_tolerance_grad(tol_grad)
            .map_err(|e| FitError::Config(format!("invalid minimizer tolerance: {e}")))?
            .with_tolerance_cost(tol_cost)
            .map_err(|e| FitError::Config(format!("invalid minimizer cost tolerance: {e}")))?;

        let res = Executor::new(&problem, solver)
            .configure(|state| state.param(init).max_iters(self.max_iter))
            .run()
            .map_err(|e| FitError::Numerical(format!("minimization failed: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| FitError::Numerical("minimizer returned no parameters".to_string()))?;
        let x = problem.expand(best);
        let min_value = objective.eval(&x)?;

        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        let at_limit = problem.at_limit(&x);
        let message = if at_limit.is_empty() {
            termination.to_string()
        } else {
            format!("{termination}; parameters at limit: {}", at_limit.join(", "))
        };

        let outcome = MinimizerOutcome {
            x,
            min_value,
            status: if converged && at_limit.is_empty() { 0 } else { 1 },
            n_evals: problem.evals.load(Ordering::Relaxed) + 1,
            message,
        };
        tracing::debug!(
            min_value = outcome.min_value,
            iterations = state.get_iter(),
            evals = outcome.n_evals,
            status = outcome.status,
            "minimization finished"
        );
        Ok(outcome)
    }
}

/// The objective restricted to its free parameters, in step units.
struct FreeProblem<'a> {
    objective: &'a dyn Objective,
    specs: &'a [ParameterSpec],
    free: Vec<usize>,
    /// Start point of every free parameter, clamped into its bounds.
    origin: Vec<f64>,
    cost_scale: f64,
    evals: AtomicUsize,
}

impl<'a> FreeProblem<'a> {
    fn new(objective: &'a dyn Objective, specs: &'a [ParameterSpec]) -> Self {
        let free: Vec<usize> = specs
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.fixed)
            .map(|(i, _)| i)
            .collect();
        let origin = free
            .iter()
            .map(|&i| specs[i].init.clamp(specs[i].lower, specs[i].upper))
            .collect();
        Self {
            objective,
            specs,
            free,
            origin,
            cost_scale: 1.0,
            evals: AtomicUsize::new(0),
        }
    }

    /// Free parameter values for a point in step units, clamped into the bounds.
    fn to_params(&self, u: &[f64]) -> Vec<f64> {
        u.iter()
            .zip(&self.free)
            .zip(&self.origin)
            .map(|((&uk, &i), &x0)| {
                let spec = &self.specs[i];
                (x0 + spec.step * uk).clamp(spec.lower, spec.upper)
            })
            .collect()
    }

    /// Full parameter vector for a point in step units.
    fn expand(&self, u: &[f64]) -> Vec<f64> {
        let mut full: Vec<f64> = self.specs.iter().map(|s| s.init).collect();
        for (v, &i) in self.to_params(u).into_iter().zip(&self.free) {
            full[i] = v;
        }
        full
    }

    fn eval_params(&self, free_x: &[f64]) -> Result<f64> {
        self.evals.fetch_add(1, Ordering::Relaxed);
        let mut full: Vec<f64> = self.specs.iter().map(|s| s.init).collect();
        for (&v, &i) in free_x.iter().zip(&self.free) {
            full[i] = v;
        }
        let value = self.objective.eval(&full)?;
        if !value.is_finite() {
            return Err(FitError::Numerical(format!("objective is not finite at {full:?}")));
        }
        Ok(value)
    }

    /// Unscaled objective gradient with respect to the step-unit coordinates,
    /// projected at the bounds.
    fn step_gradient(&self, u: &[f64]) -> Result<Vec<f64>> {
        const EDGE: f64 = 1e-12;

        let x = self.to_params(u);
        let mut grad = vec![0.0; x.len()];

        for (k, &i) in self.free.iter().enumerate() {
            let spec = &self.specs[i];
            let h = 1e-4 * spec.step * x[k].abs().max(1.0);

            let mut plus = x.clone();
            plus[k] = (x[k] + h).min(spec.upper);
            let mut minus = x.clone();
            minus[k] = (x[k] - h).max(spec.lower);

            let span = plus[k] - minus[k];
            if span <= 0.0 {
                continue;
            }
            grad[k] = spec.step * (self.eval_params(&plus)? - self.eval_params(&minus)?) / span;

            if x[k] <= spec.lower + EDGE && grad[k] > 0.0 {
                grad[k] = 0.0;
            }
            if x[k] >= spec.upper - EDGE && grad[k] < 0.0 {
                grad[k] = 0.0;
            }
        }

        Ok(grad)
    }

    /// Names of free parameters sitting on one of their bounds.
    fn at_limit(&self, x: &[f64]) -> Vec<String> {
        self.free
            .iter()
            .filter(|&&i| {
                let spec = &self.specs[i];
                let tol = 1e-9 * (spec.upper - spec.lower).abs().max(1.0);
                x[i] <= spec.lower + tol || x[i] >= spec.upper - tol
            })
            .map(|&i| self.specs[i].name.clone())
            .collect()
    }
}

impl CostFunction for &FreeProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        Ok(self.eval_params(&self.to_params(params))? / self.cost_scale)
    }
}

impl Gradient for &FreeProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        let grad = self.step_gradient(params)?;
        Ok(grad.into_iter().map(|g| g / self.cost_scale).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// `(x - 0.3)^2 / 0.01 + (y + 1.5)^2`
    struct Quadratic;

    impl Objective for Quadratic {
        fn num_params(&self) -> usize {
            2
        }

        fn eval(&self, p: &[f64]) -> Result<f64> {
            Ok((p[0] - 0.3).powi(2) / 0.01 + (p[1] + 1.5).powi(2))
        }
    }

    fn specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::free("x", 0.0, 1e-2, -1.0, 1.0),
            ParameterSpec::free("y", 0.0, 1.0, -5.0, 5.0),
        ]
    }

    #[test]
    fn finds_unconstrained_minimum() {
        let outcome = LbfgsMinimizer::default().minimize(&Quadratic, &specs()).unwrap();
        assert!(outcome.converged(), "{}", outcome.message);
        assert_relative_eq!(outcome.x[0], 0.3, epsilon = 1e-4);
        assert_relative_eq!(outcome.x[1], -1.5, epsilon = 1e-4);
        assert!(outcome.min_value < 1e-6);
        assert!(outcome.n_evals > 0);
    }

    #[test]
    fn respects_bounds() {
        let mut specs = specs();
        specs[1].lower = -1.0;
        let outcome = LbfgsMinimizer::default().minimize(&Quadratic, &specs).unwrap();
        assert_relative_eq!(outcome.x[1], -1.0, epsilon = 1e-6);
        assert_relative_eq!(outcome.min_value, 0.25, epsilon = 1e-4);
        assert_eq!(outcome.status, 1);
        assert!(outcome.message.contains("parameters at limit: y"), "{}", outcome.message);
    }

    /// Narrow well at `x = 0.3` plus a shallower one on the upper bound.
    struct TwoWells;

    impl Objective for TwoWells {
        fn num_params(&self) -> usize {
            1
        }

        fn eval(&self, p: &[f64]) -> Result<f64> {
            let near = (p[0] - 0.3).powi(2);
            let edge = (p[0] - 1.0).powi(2) + 0.05;
            Ok(1e4 * near.min(edge))
        }
    }

    #[test]
    fn first_move_is_limited_by_step() {
        // A unit move along the raw gradient would land on the upper bound,
        // which is lower than the start but far from the real minimum.
        let specs = [ParameterSpec::free("x", 0.0, 1e-2, -1.0, 1.0)];
        let outcome = LbfgsMinimizer::default().minimize(&TwoWells, &specs).unwrap();
        assert!(outcome.converged(), "{}", outcome.message);
        assert_relative_eq!(outcome.x[0], 0.3, epsilon = 1e-4);
        assert!(outcome.min_value < 1e-4);
    }

    #[test]
    fn invalid_step_is_rejected() {
        let mut specs = specs();
        specs[0].step = 0.0;
        let err = LbfgsMinimizer::default().minimize(&Quadratic, &specs).unwrap_err();
        assert!(matches!(err, FitError::Config(_)));
    }

    #[test]
    fn fixed_parameters_stay_put() {
        let mut specs = specs();
        specs[0].fix_at(0.5);
        let outcome = LbfgsMinimizer::default().minimize(&Quadratic, &specs).unwrap();
        assert_eq!(outcome.x[0], 0.5);
        assert_relative_eq!(outcome.x[1], -1.5, epsilon = 1e-4);
        assert_relative_eq!(outcome.min_value, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn all_fixed_evaluates_once() {
        let mut specs = specs();
        specs[0].fix_at(0.3);
        specs[1].fix_at(-0.5);
        let outcome = LbfgsMinimizer::default().minimize(&Quadratic, &specs).unwrap();
        assert_eq!(outcome.n_evals, 1);
        assert_relative_eq!(outcome.min_value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn spec_count_mismatch_is_rejected() {
        let err = LbfgsMinimizer::default()
            .minimize(&Quadratic, &specs()[..1])
            .unwrap_err();
        assert!(matches!(err, FitError::Precondition(_)));
    }
}
