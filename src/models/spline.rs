//! Linear spline in `ln pt`.
//!
//! Nodes are placed equidistantly in `ln pt` between `pt_min` and `pt_max`;
//! parameter `i` is the correction offset at node `i`. Between nodes the offset
//! is interpolated linearly in `ln pt`, beyond the outer nodes it is held
//! constant, so the model is finite for any pt.

use crate::error::{FitError, Result};
use crate::math::log_space;
use crate::models::model::CorrectionModel;

#[derive(Debug, Clone, PartialEq)]
pub struct SplineCorrection {
    log_nodes: Vec<f64>,
    params: Vec<f64>,
}

impl SplineCorrection {
    pub fn new(pt_min: f64, pt_max: f64, num_nodes: usize) -> Result<Self> {
        let nodes = log_space(pt_min, pt_max, num_nodes)?;
        Ok(Self {
            log_nodes: nodes.iter().map(|pt| pt.ln()).collect(),
            params: vec![0.0; num_nodes],
        })
    }

    fn offset(&self, log_pt: f64) -> f64 {
        let n = self.log_nodes.len();
        if log_pt <= self.log_nodes[0] {
            return self.params[0];
        }
        if log_pt >= self.log_nodes[n - 1] {
            return self.params[n - 1];
        }

        let upper = self.log_nodes.partition_point(|&x| x <= log_pt);
        let lower = upper - 1;
        let w = (log_pt - self.log_nodes[lower]) / (self.log_nodes[upper] - self.log_nodes[lower]);
        self.params[lower] * (1.0 - w) + self.params[upper] * w
    }
}

impl CorrectionModel for SplineCorrection {
    fn label(&self) -> &'static str {
        "spline"
    }

    fn num_params(&self) -> usize {
        self.params.len()
    }

    fn params(&self) -> &[f64] {
        &self.params
    }

    fn eval(&self, pt: f64) -> f64 {
        // ln(0) = -inf clamps to the first node.
        1.0 + self.offset(pt.ln())
    }

    fn with_params(&self, params: &[f64]) -> Result<Box<dyn CorrectionModel>> {
        if params.len() != self.params.len() {
            return Err(FitError::Precondition(format!(
                "spline correction takes {} parameters, got {}",
                self.params.len(),
                params.len()
            )));
        }
        Ok(Box::new(Self {
            log_nodes: self.log_nodes.clone(),
            params: params.to_vec(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reproduces_node_values() {
        let spline = SplineCorrection::new(30.0, 1500.0, 5).unwrap();
        let moved = spline.with_params(&[0.1, 0.0, -0.1, 0.05, 0.02]).unwrap();
        let nodes = log_space(30.0, 1500.0, 5).unwrap();
        assert_relative_eq!(moved.eval(nodes[0]), 1.1, epsilon = 1e-12);
        assert_relative_eq!(moved.eval(nodes[2]), 0.9, epsilon = 1e-12);
        assert_relative_eq!(moved.eval(nodes[4]), 1.02, epsilon = 1e-12);
    }

    #[test]
    fn interpolates_in_log_pt_and_clamps() {
        let spline = SplineCorrection::new(10.0, 1000.0, 3).unwrap();
        let moved = spline.with_params(&[0.0, 0.2, 0.4]).unwrap();
        // Midpoint in ln pt between 10 and 100.
        assert_relative_eq!(moved.eval((1000.0_f64).sqrt()), 1.1, epsilon = 1e-12);
        assert_relative_eq!(moved.eval(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(moved.eval(5000.0), 1.4, epsilon = 1e-12);
    }
}
