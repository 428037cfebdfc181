//! Core traits for NextStat
//!
//! Kernels, conditional distributions and systematics all expose their free
//! parameters through [`Fittable`], so a fit layer can address a composite of
//! them as one flat parameter vector.

use crate::{Error, Result};

/// Parameter interface for anything that can float in a fit.
///
/// Parameter order is stable: `parameter_names()[i]` labels `parameters()[i]`.
pub trait Fittable {
    /// Prepare the object for exposure to a fit.
    ///
    /// Objects whose parameters are always live need nothing here.
    fn make_fittable(&mut self) {}

    /// Parameter names (stable order).
    fn parameter_names(&self) -> Vec<String>;

    /// Current parameter values, same order as [`Fittable::parameter_names`].
    fn parameters(&self) -> Vec<f64>;

    /// Replace all parameter values.
    ///
    /// Fails with [`Error::ParameterCount`] if `params.len() != self.parameter_count()`.
    fn set_parameters(&mut self, params: &[f64]) -> Result<()>;

    /// Number of parameters.
    fn parameter_count(&self) -> usize {
        self.parameter_names().len()
    }
}

/// Check a parameter vector length against the expected count.
///
/// `what` names the object in the error message.
pub fn check_parameter_count(what: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::ParameterCount(format!(
            "{what} expects {expected} parameters, got {got}"
        )));
    }
    Ok(())
}
