//! Position-independent probability kernels `P(x)`.
//!
//! A kernel is a normalized density over `n_dims` coordinates that can report
//! its probability mass inside an axis-aligned box. Kernels become conditional
//! distributions `P(x | x₂) = P(x - x₂)` through [`crate::conditional::JumpDist`].

use ns_core::{Error, Fittable, Result};
use std::fmt;

mod gaussian;
mod numeric;

pub use gaussian::GaussianKernel;
pub use numeric::{DensityFn, NumericKernel};

/// A normalized density that can be integrated over boxes.
pub trait Kernel: Fittable + fmt::Debug + Send + Sync {
    /// Number of coordinates the kernel is defined over.
    fn n_dims(&self) -> usize;

    /// Probability mass inside `[low, high]` (one entry per dimension).
    fn integral(&self, low: &[f64], high: &[f64]) -> Result<f64>;

    /// Deep copy behind a fresh box.
    fn clone_box(&self) -> Box<dyn Kernel>;
}

impl Clone for Box<dyn Kernel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Validate that box edges match the kernel dimensionality.
pub(crate) fn check_box(what: &str, n_dims: usize, low: &[f64], high: &[f64]) -> Result<()> {
    if low.len() != n_dims || high.len() != n_dims {
        return Err(Error::Dimension(format!(
            "{what} is {n_dims}-dimensional, got box with {} low and {} high edges",
            low.len(),
            high.len()
        )));
    }
    Ok(())
}
