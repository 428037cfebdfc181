//! Probability building blocks for NextStat binned systematics.
//!
//! This crate hosts the kernel layer used to build response matrices:
//! - [`kernel`]: position-independent densities `P(x)` with box integrals
//! - [`conditional`]: conditional densities `P(x | x₂)`, including the
//!   [`conditional::JumpDist`] adapter that turns a kernel into one
//! - small numeric helpers ([`normal`], [`quadrature`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conditional;
pub mod kernel;
pub mod normal;
pub mod quadrature;

pub use conditional::{ConditionalDistribution, JumpDist, ResolutionGaussian};
pub use kernel::{DensityFn, GaussianKernel, Kernel, NumericKernel};
