//! Canonical ordering of nuisance parameters.
//!
//! Every measurement registers the systematic effects it depends on while it is
//! constructed. Once construction is done the registry is only borrowed
//! immutably: the loss combiner and all measurements agree on one ordering, and
//! the parameter vector handed to the minimizer follows it.

use crate::error::{FitError, Result};

/// Stable handle to a registered nuisance parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NuisanceId(usize);

impl NuisanceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered list of named nuisance parameters.
#[derive(Debug, Clone, Default)]
pub struct NuisanceRegistry {
    names: Vec<String>,
}

impl NuisanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a nuisance parameter, returning the existing handle if the name is known.
    pub fn register(&mut self, name: impl Into<String>) -> NuisanceId {
        let name = name.into();
        if let Some(id) = self.index_of(&name) {
            return id;
        }
        self.names.push(name);
        NuisanceId(self.names.len() - 1)
    }

    pub fn num_params(&self) -> usize {
        self.names.len()
    }

    /// Canonical name for a zero-based index.
    pub fn name(&self, index: usize) -> Result<&str> {
        self.names.get(index).map(String::as_str).ok_or_else(|| {
            FitError::Precondition(format!(
                "nuisance index {index} out of range (registered: {})",
                self.names.len()
            ))
        })
    }

    pub fn index_of(&self, name: &str) -> Option<NuisanceId> {
        self.names.iter().position(|n| n == name).map(NuisanceId)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Build nuisance values from a slice laid out in registration order.
    pub fn build<'r>(&'r self, values: &[f64]) -> Result<NuisanceValues<'r>> {
        if values.len() != self.names.len() {
            return Err(FitError::Precondition(format!(
                "expected {} nuisance values, got {}",
                self.names.len(),
                values.len()
            )));
        }

        Ok(NuisanceValues {
            registry: self,
            values: values.to_vec(),
        })
    }

    /// All nuisances at their nominal value.
    pub fn nominal(&self) -> NuisanceValues<'_> {
        NuisanceValues {
            registry: self,
            values: vec![0.0; self.names.len()],
        }
    }
}

/// Values of all registered nuisances for a single evaluation.
///
/// Values are standard-normal pulls: 0 is nominal, magnitude is in standard
/// deviations.
#[derive(Debug, Clone)]
pub struct NuisanceValues<'r> {
    registry: &'r NuisanceRegistry,
    values: Vec<f64>,
}

impl NuisanceValues<'_> {
    pub fn get(&self, id: NuisanceId) -> f64 {
        self.values[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<f64> {
        self.registry.index_of(name).map(|id| self.get(id))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Standard-normal penalty `Σ pull²`.
    pub fn sum_of_squares(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NuisanceRegistry {
        let mut registry = NuisanceRegistry::new();
        registry.register("photon_scale");
        registry.register("fsr");
        registry.register("pileup");
        registry
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = registry();
        let again = registry.register("fsr");
        assert_eq!(again.index(), 1);
        assert_eq!(registry.num_params(), 3);
    }

    #[test]
    fn names_follow_registration_order() {
        let registry = registry();
        assert_eq!(registry.name(0).unwrap(), "photon_scale");
        assert_eq!(registry.name(2).unwrap(), "pileup");
        assert!(matches!(registry.name(3), Err(FitError::Precondition(_))));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["photon_scale", "fsr", "pileup"]);
    }

    #[test]
    fn build_maps_slice_to_names() {
        let registry = registry();
        let values = registry.build(&[0.5, -1.0, 2.0]).unwrap();
        assert_eq!(values.by_name("fsr"), Some(-1.0));
        assert_eq!(values.get(registry.index_of("pileup").unwrap()), 2.0);
        assert_eq!(values.by_name("jes"), None);
        assert_eq!(values.sum_of_squares(), 5.25);
    }

    #[test]
    fn build_rejects_length_mismatch() {
        let registry = registry();
        assert!(matches!(registry.build(&[0.0, 0.0]), Err(FitError::Precondition(_))));
    }

    #[test]
    fn nominal_is_all_zero() {
        let registry = registry();
        let values = registry.nominal();
        assert!(values.as_slice().iter().all(|&v| v == 0.0));
    }
}
