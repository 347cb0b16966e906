//! Correction model implementations.
//!
//! Models share the [`CorrectionModel`] trait so that the loss function and the
//! measurements stay agnostic of the functional form being fitted.

pub mod model;
pub mod spline;

pub use model::*;
pub use spline::*;
