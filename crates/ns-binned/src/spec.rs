//! JSON configuration for convolution systematics.
//!
//! ```json
//! {
//!   "name": "energy_resolution",
//!   "axes": [
//!     {"name": "energy", "low": 0.0, "high": 10.0, "n_bins": 20},
//!     {"name": "radius", "edges": [0.0, 1.0, 2.5, 4.0]}
//!   ],
//!   "acts_on": ["energy"],
//!   "kernel": {"type": "gaussian", "means": [0.0], "sigmas": [0.3]}
//! }
//! ```

use crate::axis::{AxisCollection, BinAxis};
use crate::convolution::Convolution;
use crate::data_rep::DataRepresentation;
use ns_core::Result;
use ns_prob::{GaussianKernel, ResolutionGaussian};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Binning of one axis: explicit edges or a uniform range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinningSpec {
    /// Explicit, strictly increasing edges.
    Edges {
        /// Bin edges.
        edges: Vec<f64>,
    },
    /// `n_bins` equal-width bins on `[low, high)`.
    Uniform {
        /// Lower edge.
        low: f64,
        /// Upper edge.
        high: f64,
        /// Number of bins.
        n_bins: usize,
    },
}

/// One named axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Axis (observable) name.
    pub name: String,
    /// Binning.
    #[serde(flatten)]
    pub binning: BinningSpec,
}

impl AxisSpec {
    /// Materialize the axis.
    pub fn build(&self) -> Result<BinAxis> {
        match &self.binning {
            BinningSpec::Edges { edges } => BinAxis::from_edges(self.name.clone(), edges.clone()),
            BinningSpec::Uniform { low, high, n_bins } => {
                BinAxis::uniform(self.name.clone(), *low, *high, *n_bins)
            }
        }
    }
}

/// Smearing kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelSpec {
    /// Position-independent Gaussian, wrapped as `P(x - x₂)`.
    Gaussian {
        /// Per-dimension means.
        means: Vec<f64>,
        /// Per-dimension standard deviations.
        sigmas: Vec<f64>,
    },
    /// Reference-dependent Gaussian resolution.
    ResolutionGaussian {
        /// Per-dimension bias.
        bias: Vec<f64>,
        /// Per-dimension constant width term.
        noise: Vec<f64>,
        /// Per-dimension stochastic width term.
        stochastic: Vec<f64>,
    },
}

/// Full configuration of a [`Convolution`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionSpec {
    /// Owner tag; defaults to `"Convolution"`.
    #[serde(default)]
    pub name: Option<String>,
    /// Full-space binning.
    pub axes: Vec<AxisSpec>,
    /// Labels of the full density; defaults to the axis names.
    #[serde(default)]
    pub observables: Option<Vec<String>>,
    /// Labels the kernel acts on; defaults to all dimensions.
    #[serde(default)]
    pub acts_on: Option<Vec<String>>,
    /// Smearing kernel.
    pub kernel: KernelSpec,
}

impl ConvolutionSpec {
    /// Parse from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Materialize the full-space binning.
    pub fn build_axes(&self) -> Result<AxisCollection> {
        AxisCollection::from_axes(self.axes.iter().map(AxisSpec::build).collect::<Result<Vec<_>>>()?)
    }
}

impl Convolution {
    /// Configured (not yet constructed) convolution from a parsed JSON description.
    pub fn from_spec(spec: &ConvolutionSpec) -> Result<Self> {
        let mut conv = match &spec.name {
            Some(name) => Convolution::with_name(name.clone()),
            None => Convolution::new(),
        };
        conv.set_axes(&spec.build_axes()?);
        if let Some(obs) = &spec.observables {
            conv.set_pdf_data_rep(DataRepresentation::new(obs.iter().cloned())?);
        }
        if let Some(acts_on) = &spec.acts_on {
            conv.set_data_rep(DataRepresentation::new(acts_on.iter().cloned())?);
        }
        match &spec.kernel {
            KernelSpec::Gaussian { means, sigmas } => {
                conv.set_function(&GaussianKernel::new(means.clone(), sigmas.clone())?);
            }
            KernelSpec::ResolutionGaussian { bias, noise, stochastic } => {
                conv.set_conditional_distribution(&ResolutionGaussian::new(
                    bias.clone(),
                    noise.clone(),
                    stochastic.clone(),
                )?);
            }
        }
        Ok(conv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolution::ConvolutionState;
    use ns_core::{Error, Fittable};

    const JSON: &str = r#"{
        "name": "energy_resolution",
        "axes": [
            {"name": "energy", "low": 0.0, "high": 10.0, "n_bins": 20},
            {"name": "radius", "edges": [0.0, 1.0, 2.5, 4.0]}
        ],
        "acts_on": ["energy"],
        "kernel": {"type": "gaussian", "means": [0.0], "sigmas": [0.3]}
    }"#;

    #[test]
    fn test_parse_and_build() {
        let spec = ConvolutionSpec::from_json_str(JSON).unwrap();
        assert_eq!(spec.axes.len(), 2);
        assert!(matches!(spec.axes[1].binning, BinningSpec::Edges { .. }));
        let mut conv = Convolution::from_spec(&spec).unwrap();
        assert_eq!(conv.state(), ConvolutionState::AxesSet);
        assert_eq!(conv.parameter_names()[1], "energy_resolution : sigma_0");
        conv.construct().unwrap();
        assert_eq!(conv.sys_axes().unwrap().names(), vec!["energy"]);
        assert_eq!(conv.pdf_mapping().n_bins(), 60);
    }

    #[test]
    fn test_resolution_kernel_spec() {
        let json = r#"{
            "axes": [{"name": "e", "low": 0.0, "high": 5.0, "n_bins": 5}],
            "kernel": {"type": "resolution_gaussian", "bias": [0.0], "noise": [0.1], "stochastic": [0.2]}
        }"#;
        let conv = Convolution::from_spec(&ConvolutionSpec::from_json_str(json).unwrap()).unwrap();
        assert_eq!(conv.name(), Convolution::DEFAULT_NAME);
        assert_eq!(conv.parameter_count(), 3);
    }

    #[test]
    fn test_bad_json_and_bad_values() {
        assert!(matches!(ConvolutionSpec::from_json_str("{"), Err(Error::Json(_))));
        let json = r#"{
            "axes": [{"name": "e", "low": 1.0, "high": 0.0, "n_bins": 5}],
            "kernel": {"type": "gaussian", "means": [0.0], "sigmas": [1.0]}
        }"#;
        let spec = ConvolutionSpec::from_json_str(json).unwrap();
        assert!(matches!(Convolution::from_spec(&spec), Err(Error::Validation(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConvolutionSpec::from_path("/nonexistent/convolution.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
