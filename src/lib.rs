//! `jecfit` library crate.
//!
//! The binary (`jecfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - new measurements and correction forms plug into the same loss and fitter
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod measurements;
pub mod models;
pub mod nuisance;
pub mod report;
