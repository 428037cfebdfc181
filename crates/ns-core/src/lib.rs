//! # ns-core
//!
//! Core types shared by the NextStat binned-systematics crates.
//!
//! This crate carries no numerics of its own. It defines:
//! - the workspace-wide [`Error`] / [`Result`] types
//! - the [`traits::Fittable`] parameter interface implemented by kernels and systematics

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;

pub use error::{Error, Result};
pub use traits::Fittable;
