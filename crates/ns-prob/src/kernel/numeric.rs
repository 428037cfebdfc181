use crate::kernel::{Kernel, check_box};
use crate::quadrature::GaussLegendre;
use ns_core::traits::check_parameter_count;
use ns_core::{Error, Fittable, Result};
use std::fmt;
use std::sync::Arc;

/// Density callback `p(x | params)` for [`NumericKernel`].
pub type DensityFn = Arc<dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync>;

/// Kernel defined by an arbitrary density, integrated with Gauss-Legendre quadrature.
///
/// The density is assumed normalized; nothing here rescales it. Accuracy is set by the
/// quadrature order and the number of sub-intervals per axis.
#[derive(Clone)]
pub struct NumericKernel {
    n_dims: usize,
    density: DensityFn,
    names: Vec<String>,
    params: Vec<f64>,
    rule: GaussLegendre,
    n_sub: usize,
}

impl NumericKernel {
    /// Default quadrature order per sub-interval.
    pub const DEFAULT_ORDER: usize = 8;

    /// Wrap a density over `n_dims` coordinates with named parameters.
    pub fn new<F>(n_dims: usize, names: Vec<String>, params: Vec<f64>, density: F) -> Result<Self>
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        if n_dims == 0 {
            return Err(Error::Dimension("NumericKernel requires at least one dimension".into()));
        }
        check_parameter_count("NumericKernel", names.len(), params.len())?;
        Ok(Self {
            n_dims,
            density: Arc::new(density),
            names,
            params,
            rule: GaussLegendre::new(Self::DEFAULT_ORDER)?,
            n_sub: 1,
        })
    }

    /// Change the quadrature order and number of sub-intervals per axis.
    pub fn with_quadrature(mut self, order: usize, n_sub: usize) -> Result<Self> {
        if n_sub == 0 {
            return Err(Error::Validation("NumericKernel n_sub must be >= 1".into()));
        }
        self.rule = GaussLegendre::new(order)?;
        self.n_sub = n_sub;
        Ok(self)
    }
}

impl fmt::Debug for NumericKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericKernel")
            .field("n_dims", &self.n_dims)
            .field("names", &self.names)
            .field("params", &self.params)
            .field("order", &self.rule.order())
            .field("n_sub", &self.n_sub)
            .finish()
    }
}

impl Fittable for NumericKernel {
    fn parameter_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn parameters(&self) -> Vec<f64> {
        self.params.clone()
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        check_parameter_count("NumericKernel", self.params.len(), params.len())?;
        self.params.copy_from_slice(params);
        Ok(())
    }
}

impl Kernel for NumericKernel {
    fn n_dims(&self) -> usize {
        self.n_dims
    }

    fn integral(&self, low: &[f64], high: &[f64]) -> Result<f64> {
        check_box("NumericKernel", self.n_dims, low, high)?;
        let params = &self.params;
        let v = self.rule.integrate_box(low, high, self.n_sub, |x| (self.density)(x, params))?;
        if !v.is_finite() {
            return Err(Error::Validation(format!("NumericKernel integral is not finite: {v}")));
        }
        Ok(v)
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}
