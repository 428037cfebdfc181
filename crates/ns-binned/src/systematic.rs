//! Systematic interface and ordered chains of systematics.

use crate::axis::AxisCollection;
use crate::convolution::Convolution;
use crate::data_rep::DataRepresentation;
use crate::density::BinnedDensity;
use crate::response::ResponseMatrix;
use ns_core::traits::check_parameter_count;
use ns_core::{Error, Fittable, Result};
use std::fmt;

/// A systematic effect expressed as a response matrix over a binning.
pub trait Systematic: Fittable + fmt::Debug + Send + Sync {
    /// Owner tag (used in parameter names).
    fn name(&self) -> &str;

    /// Assign the full-space binning.
    fn set_axes(&mut self, axes: &AxisCollection);

    /// Assign the labels of the full density the systematic acts within.
    fn set_pdf_data_rep(&mut self, rep: DataRepresentation);

    /// (Re)build the response matrix from the current parameters.
    fn construct(&mut self) -> Result<()>;

    /// The built response matrix.
    fn response(&self) -> &ResponseMatrix;

    /// Deep copy behind a fresh box.
    fn clone_box(&self) -> Box<dyn Systematic>;
}

impl Clone for Box<dyn Systematic> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl Systematic for Convolution {
    fn name(&self) -> &str {
        Convolution::name(self)
    }

    fn set_axes(&mut self, axes: &AxisCollection) {
        Convolution::set_axes(self, axes);
    }

    fn set_pdf_data_rep(&mut self, rep: DataRepresentation) {
        Convolution::set_pdf_data_rep(self, rep);
    }

    fn construct(&mut self) -> Result<()> {
        Convolution::construct(self)
    }

    fn response(&self) -> &ResponseMatrix {
        self.pdf_mapping()
    }

    fn clone_box(&self) -> Box<dyn Systematic> {
        Box::new(self.clone())
    }
}

/// Ordered list of systematics applied one after another.
///
/// The first systematic added acts first. The combined operator is
/// `R_n · … · R_2 · R_1`, built without materializing intermediate densities.
#[derive(Debug, Clone, Default)]
pub struct SystematicSet {
    systematics: Vec<Box<dyn Systematic>>,
    total: Option<ResponseMatrix>,
}

impl SystematicSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a systematic (acts after those already present).
    pub fn push<S: Systematic + 'static>(&mut self, systematic: S) {
        self.systematics.push(Box::new(systematic));
        self.total = None;
    }

    /// Number of systematics.
    pub fn len(&self) -> usize {
        self.systematics.len()
    }

    /// `true` when no systematics are present.
    pub fn is_empty(&self) -> bool {
        self.systematics.is_empty()
    }

    /// Systematics in application order.
    pub fn systematics(&self) -> &[Box<dyn Systematic>] {
        &self.systematics
    }

    /// Assign binning and density labels to every systematic.
    pub fn configure(&mut self, axes: &AxisCollection, pdf_data_rep: &DataRepresentation) {
        for s in &mut self.systematics {
            s.set_axes(axes);
            s.set_pdf_data_rep(pdf_data_rep.clone());
        }
        self.total = None;
    }

    /// Rebuild every systematic and the combined operator.
    pub fn construct_all(&mut self) -> Result<()> {
        for s in &mut self.systematics {
            s.construct()?;
        }
        let mut iter = self.systematics.iter().rev();
        self.total = match iter.next() {
            None => None,
            Some(last) => {
                let mut total = last.response().clone();
                for s in iter {
                    total.combine(s.response())?;
                }
                Some(total)
            }
        };
        Ok(())
    }

    /// Combined operator from the last [`SystematicSet::construct_all`].
    pub fn total_response(&self) -> Result<&ResponseMatrix> {
        self.total.as_ref().ok_or_else(|| {
            Error::Logic("systematic set has not been constructed (or is empty)".into())
        })
    }

    /// Apply the combined operator. An empty set returns the density unchanged.
    pub fn apply(&self, density: &BinnedDensity) -> Result<BinnedDensity> {
        if self.systematics.is_empty() {
            return Ok(density.clone());
        }
        self.total_response()?.apply(density)
    }
}

impl Fittable for SystematicSet {
    fn make_fittable(&mut self) {
        for s in &mut self.systematics {
            s.make_fittable();
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        self.systematics.iter().flat_map(|s| s.parameter_names()).collect()
    }

    fn parameters(&self) -> Vec<f64> {
        self.systematics.iter().flat_map(|s| s.parameters()).collect()
    }

    fn parameter_count(&self) -> usize {
        self.systematics.iter().map(|s| s.parameter_count()).sum()
    }

    /// All-or-nothing: if one systematic rejects its slice, the ones before it get their
    /// previous values back.
    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        check_parameter_count("SystematicSet", self.parameter_count(), params.len())?;
        let previous = self.parameters();
        let mut offset = 0;
        let mut failure = None;
        for (i, s) in self.systematics.iter_mut().enumerate() {
            let n = s.parameter_count();
            if let Err(e) = s.set_parameters(&params[offset..offset + n]) {
                failure = Some((i, e));
                break;
            }
            offset += n;
        }
        let Some((updated, err)) = failure else {
            return Ok(());
        };

        let mut offset = 0;
        for s in &mut self.systematics[..updated] {
            let n = s.parameter_count();
            s.set_parameters(&previous[offset..offset + n])?;
            offset += n;
        }
        Err(err)
    }
}
