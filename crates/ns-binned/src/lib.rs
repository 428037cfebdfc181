//! # ns-binned
//!
//! Binned densities and the response-matrix machinery for convolution systematics.
//!
//! This crate provides:
//! - [`AxisCollection`] binning with flat ↔ multi-index addressing.
//! - [`BinnedDensity`], a histogram-shaped density over that binning.
//! - [`ResponseMatrix`], a sparse `n_bins × n_bins` operator applied to densities.
//! - [`Convolution`], which integrates a smearing kernel on the acted-on sub-space
//!   and expands it into a full [`ResponseMatrix`].
//! - [`SystematicSet`] chaining and a [`ChiSquare`] test statistic on top.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axis;
pub mod chi_square;
pub mod convolution;
pub mod data_rep;
pub mod density;
pub mod response;
pub mod spec;
pub mod systematic;

pub use axis::{AxisCollection, BinAxis};
pub use chi_square::ChiSquare;
pub use convolution::{Convolution, ConvolutionState};
pub use data_rep::DataRepresentation;
pub use density::BinnedDensity;
pub use response::ResponseMatrix;
pub use spec::{AxisSpec, BinningSpec, ConvolutionSpec, KernelSpec};
pub use systematic::{Systematic, SystematicSet};
