//! Conditional distributions `P(x | x₂)`.
//!
//! These are the transfer kernels used to build response matrices: the mass a
//! source bin centred at `x₂` deposits into a destination box `[low, high]`.

use ns_core::{Fittable, Result};
use std::fmt;

mod jump;
mod resolution;

pub use jump::JumpDist;
pub use resolution::ResolutionGaussian;

/// A parametrizable conditional density that can be integrated over boxes.
pub trait ConditionalDistribution: Fittable + fmt::Debug + Send + Sync {
    /// Number of coordinates in `x` (and in the reference point).
    fn n_dims(&self) -> usize;

    /// Mass of `P(x | reference)` inside `[low, high]`.
    fn integral(&self, low: &[f64], high: &[f64], reference: &[f64]) -> Result<f64>;

    /// Deep copy behind a fresh box.
    fn clone_box(&self) -> Box<dyn ConditionalDistribution>;
}

impl Clone for Box<dyn ConditionalDistribution> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
