use crate::conditional::ConditionalDistribution;
use crate::kernel::Kernel;
use ns_core::{Error, Fittable, Result};

/// Position-independent conditional distribution `P(x | x₂) = P(x - x₂)`.
///
/// Shifts the integration box by the reference point and delegates to the wrapped
/// [`Kernel`]. Parameters are the kernel's.
#[derive(Debug, Clone)]
pub struct JumpDist {
    kernel: Box<dyn Kernel>,
}

impl JumpDist {
    /// Take ownership of a kernel.
    pub fn new<K: Kernel + 'static>(kernel: K) -> Self {
        Self { kernel: Box::new(kernel) }
    }

    /// Wrap an already boxed kernel.
    pub fn from_boxed(kernel: Box<dyn Kernel>) -> Self {
        Self { kernel }
    }

    /// The wrapped kernel.
    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }
}

impl Fittable for JumpDist {
    fn make_fittable(&mut self) {
        self.kernel.make_fittable();
    }

    fn parameter_names(&self) -> Vec<String> {
        self.kernel.parameter_names()
    }

    fn parameters(&self) -> Vec<f64> {
        self.kernel.parameters()
    }

    fn parameter_count(&self) -> usize {
        self.kernel.parameter_count()
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        self.kernel.set_parameters(params)
    }
}

impl ConditionalDistribution for JumpDist {
    fn n_dims(&self) -> usize {
        self.kernel.n_dims()
    }

    fn integral(&self, low: &[f64], high: &[f64], reference: &[f64]) -> Result<f64> {
        if reference.len() != low.len() || reference.len() != high.len() {
            return Err(Error::Dimension(format!(
                "JumpDist reference point has {} coordinates, box has {} low / {} high edges",
                reference.len(),
                low.len(),
                high.len()
            )));
        }
        let shifted_low: Vec<f64> = low.iter().zip(reference).map(|(l, r)| l - r).collect();
        let shifted_high: Vec<f64> = high.iter().zip(reference).map(|(h, r)| h - r).collect();
        self.kernel.integral(&shifted_low, &shifted_high)
    }

    fn clone_box(&self) -> Box<dyn ConditionalDistribution> {
        Box::new(self.clone())
    }
}
