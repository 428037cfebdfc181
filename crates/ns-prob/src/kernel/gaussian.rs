use crate::kernel::{Kernel, check_box};
use crate::normal;
use ns_core::traits::check_parameter_count;
use ns_core::{Error, Fittable, Result};

/// Axis-aligned multivariate Gaussian `N(μ, diag(σ²))`.
///
/// The box integral factorizes into a product of 1-D interval masses, so it is exact
/// up to the precision of `erfc`.
///
/// Parameters are laid out as `[mean_0, .., mean_{n-1}, sigma_0, .., sigma_{n-1}]`.
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    means: Vec<f64>,
    sigmas: Vec<f64>,
}

impl GaussianKernel {
    /// Create a Gaussian from per-dimension means and standard deviations.
    pub fn new(means: Vec<f64>, sigmas: Vec<f64>) -> Result<Self> {
        if means.is_empty() {
            return Err(Error::Dimension("GaussianKernel requires at least one dimension".into()));
        }
        if means.len() != sigmas.len() {
            return Err(Error::Dimension(format!(
                "GaussianKernel means/sigmas length mismatch: {} vs {}",
                means.len(),
                sigmas.len()
            )));
        }
        validate(&means, &sigmas)?;
        Ok(Self { means, sigmas })
    }

    /// Zero-mean Gaussian with the same `sigma` on every dimension.
    pub fn centred(n_dims: usize, sigma: f64) -> Result<Self> {
        Self::new(vec![0.0; n_dims], vec![sigma; n_dims])
    }

    /// Per-dimension means.
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Per-dimension standard deviations.
    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }
}

fn validate(means: &[f64], sigmas: &[f64]) -> Result<()> {
    if let Some(m) = means.iter().find(|m| !m.is_finite()) {
        return Err(Error::Validation(format!("GaussianKernel means must be finite, got {m}")));
    }
    if let Some(s) = sigmas.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(Error::Validation(format!(
            "GaussianKernel sigmas must be finite and > 0, got {s}"
        )));
    }
    Ok(())
}

impl Fittable for GaussianKernel {
    fn parameter_names(&self) -> Vec<String> {
        let n = self.means.len();
        (0..n).map(|i| format!("mean_{i}")).chain((0..n).map(|i| format!("sigma_{i}"))).collect()
    }

    fn parameters(&self) -> Vec<f64> {
        self.means.iter().chain(&self.sigmas).copied().collect()
    }

    fn parameter_count(&self) -> usize {
        2 * self.means.len()
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        check_parameter_count("GaussianKernel", self.parameter_count(), params.len())?;
        let (means, sigmas) = params.split_at(self.means.len());
        validate(means, sigmas)?;
        self.means.copy_from_slice(means);
        self.sigmas.copy_from_slice(sigmas);
        Ok(())
    }
}

impl Kernel for GaussianKernel {
    fn n_dims(&self) -> usize {
        self.means.len()
    }

    fn integral(&self, low: &[f64], high: &[f64]) -> Result<f64> {
        check_box("GaussianKernel", self.n_dims(), low, high)?;
        let mut mass = 1.0;
        for d in 0..self.n_dims() {
            mass *= normal::interval_mass(low[d], high[d], self.means[d], self.sigmas[d])?;
            if mass == 0.0 {
                break;
            }
        }
        Ok(mass)
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_integral_factorizes() {
        let k = GaussianKernel::new(vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        let m = k.integral(&[-1.0, -1.0], &[1.0, 3.0]).unwrap();
        let expected = normal::interval_mass(-1.0, 1.0, 0.0, 1.0).unwrap()
            * normal::interval_mass(-1.0, 3.0, 1.0, 2.0).unwrap();
        assert_relative_eq!(m, expected, epsilon = 1e-14);
    }

    #[test]
    fn test_parameter_roundtrip_and_names() {
        let mut k = GaussianKernel::centred(2, 0.5).unwrap();
        assert_eq!(k.parameter_names(), vec!["mean_0", "mean_1", "sigma_0", "sigma_1"]);
        k.set_parameters(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(k.parameters(), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_wrong_parameter_count() {
        let mut k = GaussianKernel::centred(1, 1.0).unwrap();
        let err = k.set_parameters(&[0.0]).unwrap_err();
        assert!(matches!(err, Error::ParameterCount(_)));
        // Values untouched after a failed update.
        assert_eq!(k.parameters(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_invalid_sigma_rejected() {
        assert!(GaussianKernel::new(vec![0.0], vec![0.0]).is_err());
        let mut k = GaussianKernel::centred(1, 1.0).unwrap();
        assert!(matches!(k.set_parameters(&[0.0, -1.0]), Err(Error::Validation(_))));
    }

    #[test]
    fn test_box_dimension_checked() {
        let k = GaussianKernel::centred(2, 1.0).unwrap();
        assert!(matches!(k.integral(&[0.0], &[1.0]), Err(Error::Dimension(_))));
    }
}
