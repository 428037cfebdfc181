use crate::conditional::ConditionalDistribution;
use crate::normal;
use ns_core::traits::check_parameter_count;
use ns_core::{Error, Fittable, Result};

/// Gaussian smearing whose width grows with the reference point.
///
/// Per dimension `d`, `x_d ~ N(x₂_d + bias_d, σ_d(x₂))` with the calorimeter-style
/// resolution `σ_d² = noise_d² + stochastic_d² · max(x₂_d, 0)`.
///
/// Parameters: `[bias_0.., noise_0.., stochastic_0..]`.
#[derive(Debug, Clone)]
pub struct ResolutionGaussian {
    bias: Vec<f64>,
    noise: Vec<f64>,
    stochastic: Vec<f64>,
}

impl ResolutionGaussian {
    /// Create a resolution model; all three vectors need one entry per dimension.
    pub fn new(bias: Vec<f64>, noise: Vec<f64>, stochastic: Vec<f64>) -> Result<Self> {
        if bias.is_empty() {
            return Err(Error::Dimension(
                "ResolutionGaussian requires at least one dimension".into(),
            ));
        }
        if noise.len() != bias.len() || stochastic.len() != bias.len() {
            return Err(Error::Dimension(format!(
                "ResolutionGaussian parameter blocks disagree: bias={}, noise={}, stochastic={}",
                bias.len(),
                noise.len(),
                stochastic.len()
            )));
        }
        validate(&bias, &noise, &stochastic)?;
        Ok(Self { bias, noise, stochastic })
    }

    /// Width at reference coordinate `x2` along dimension `d`.
    pub fn sigma_at(&self, d: usize, x2: f64) -> f64 {
        (self.noise[d].powi(2) + self.stochastic[d].powi(2) * x2.max(0.0)).sqrt()
    }
}

fn validate(bias: &[f64], noise: &[f64], stochastic: &[f64]) -> Result<()> {
    if bias.iter().chain(stochastic).any(|v| !v.is_finite()) {
        return Err(Error::Validation("ResolutionGaussian parameters must be finite".into()));
    }
    if let Some(n) = noise.iter().find(|n| !(n.is_finite() && **n > 0.0)) {
        return Err(Error::Validation(format!(
            "ResolutionGaussian noise terms must be finite and > 0, got {n}"
        )));
    }
    Ok(())
}

impl Fittable for ResolutionGaussian {
    fn parameter_names(&self) -> Vec<String> {
        let n = self.bias.len();
        let block = |prefix: &'static str| (0..n).map(move |i| format!("{prefix}_{i}"));
        block("bias").chain(block("noise")).chain(block("stochastic")).collect()
    }

    fn parameters(&self) -> Vec<f64> {
        self.bias.iter().chain(&self.noise).chain(&self.stochastic).copied().collect()
    }

    fn parameter_count(&self) -> usize {
        3 * self.bias.len()
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        check_parameter_count("ResolutionGaussian", self.parameter_count(), params.len())?;
        let n = self.bias.len();
        let (bias, rest) = params.split_at(n);
        let (noise, stochastic) = rest.split_at(n);
        validate(bias, noise, stochastic)?;
        self.bias.copy_from_slice(bias);
        self.noise.copy_from_slice(noise);
        self.stochastic.copy_from_slice(stochastic);
        Ok(())
    }
}

impl ConditionalDistribution for ResolutionGaussian {
    fn n_dims(&self) -> usize {
        self.bias.len()
    }

    fn integral(&self, low: &[f64], high: &[f64], reference: &[f64]) -> Result<f64> {
        let n = self.n_dims();
        if low.len() != n || high.len() != n || reference.len() != n {
            return Err(Error::Dimension(format!(
                "ResolutionGaussian is {n}-dimensional, got low={}, high={}, reference={}",
                low.len(),
                high.len(),
                reference.len()
            )));
        }
        let mut mass = 1.0;
        for d in 0..n {
            let mu = reference[d] + self.bias[d];
            mass *= normal::interval_mass(low[d], high[d], mu, self.sigma_at(d, reference[d]))?;
            if mass == 0.0 {
                break;
            }
        }
        Ok(mass)
    }

    fn clone_box(&self) -> Box<dyn ConditionalDistribution> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_width_grows_with_reference() {
        let r = ResolutionGaussian::new(vec![0.0], vec![0.1], vec![0.5]).unwrap();
        assert!(r.sigma_at(0, 4.0) > r.sigma_at(0, 1.0));
        assert_relative_eq!(r.sigma_at(0, -3.0), 0.1, epsilon = 1e-15);
        let narrow = r.integral(&[0.9], &[1.1], &[1.0]).unwrap();
        let wide = r.integral(&[3.9], &[4.1], &[4.0]).unwrap();
        assert!(narrow > wide);
    }

    #[test]
    fn test_bias_shifts_mass() {
        let r = ResolutionGaussian::new(vec![1.0], vec![0.2], vec![0.0]).unwrap();
        let at_ref = r.integral(&[-0.5], &[0.5], &[0.0]).unwrap();
        let at_bias = r.integral(&[0.5], &[1.5], &[0.0]).unwrap();
        assert!(at_bias > 0.9);
        assert!(at_ref < 0.01);
    }

    #[test]
    fn test_parameter_layout() {
        let mut r = ResolutionGaussian::new(vec![0.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]).unwrap();
        assert_eq!(r.parameter_count(), 6);
        assert_eq!(r.parameter_names()[2], "noise_0");
        assert!(matches!(r.set_parameters(&[0.0; 5]), Err(Error::ParameterCount(_))));
        assert!(matches!(
            r.set_parameters(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
            Err(Error::Validation(_))
        ));
    }
}
