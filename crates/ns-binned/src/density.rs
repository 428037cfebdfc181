//! Binned densities: a flat content vector over an [`AxisCollection`].

use crate::axis::AxisCollection;
use crate::data_rep::DataRepresentation;
use ns_core::{Error, Result};

/// Histogram-shaped density over an N-dimensional binning.
///
/// Contents are addressed by the flat bin index of the axes. The data
/// representation defaults to the axis names.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedDensity {
    axes: AxisCollection,
    data_rep: DataRepresentation,
    contents: Vec<f64>,
}

impl BinnedDensity {
    /// Empty density over `axes`.
    pub fn new(axes: AxisCollection) -> Self {
        // Axis names are unique within a collection, so this cannot fail.
        let data_rep = DataRepresentation::new(axes.names()).unwrap_or_default();
        let contents = vec![0.0; axes.n_bins()];
        Self { axes, data_rep, contents }
    }

    /// Density with the given contents.
    pub fn with_contents(axes: AxisCollection, contents: Vec<f64>) -> Result<Self> {
        let mut d = Self::new(axes);
        d.set_bin_contents(contents)?;
        Ok(d)
    }

    /// Binning.
    pub fn axes(&self) -> &AxisCollection {
        &self.axes
    }

    /// Observable labels of each dimension.
    pub fn data_rep(&self) -> &DataRepresentation {
        &self.data_rep
    }

    /// Replace the observable labels; one label per dimension.
    pub fn set_data_rep(&mut self, rep: DataRepresentation) -> Result<()> {
        if rep.len() != self.n_dims() {
            return Err(Error::Dimension(format!(
                "data representation has {} labels for a {}-dimensional density",
                rep.len(),
                self.n_dims()
            )));
        }
        self.data_rep = rep;
        Ok(())
    }

    /// Number of dimensions.
    pub fn n_dims(&self) -> usize {
        self.axes.n_dims()
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.axes.n_bins()
    }

    /// Flat content vector.
    pub fn bin_contents(&self) -> &[f64] {
        &self.contents
    }

    /// Replace all contents; length must equal `n_bins`.
    pub fn set_bin_contents(&mut self, contents: Vec<f64>) -> Result<()> {
        if contents.len() != self.n_bins() {
            return Err(Error::Dimension(format!(
                "density has {} bins, got {} contents",
                self.n_bins(),
                contents.len()
            )));
        }
        self.contents = contents;
        Ok(())
    }

    /// Content of flat bin `bin`.
    pub fn bin_content(&self, bin: usize) -> Result<f64> {
        self.contents.get(bin).copied().ok_or_else(|| {
            Error::NotFound(format!("bin {bin} out of range for density with {} bins", self.n_bins()))
        })
    }

    /// Zero all contents.
    pub fn empty(&mut self) {
        self.contents.iter_mut().for_each(|c| *c = 0.0);
    }

    /// Add `weight` to the bin containing `point` (axis order). Points outside the
    /// binning are dropped.
    pub fn fill(&mut self, point: &[f64], weight: f64) -> Result<()> {
        if let Some(bin) = self.axes.find_bin(point)? {
            self.contents[bin] += weight;
        }
        Ok(())
    }

    /// Fill from a raw event whose coordinates are labelled by `event_rep`.
    pub fn fill_event(&mut self, event: &[f64], event_rep: &DataRepresentation, weight: f64) -> Result<()> {
        if event.len() != event_rep.len() {
            return Err(Error::Dimension(format!(
                "event has {} values but its representation has {} labels",
                event.len(),
                event_rep.len()
            )));
        }
        let point: Vec<f64> = self
            .data_rep
            .relative_indices(event_rep)?
            .into_iter()
            .map(|i| event[i])
            .collect();
        self.fill(&point, weight)
    }

    /// Sum of all contents.
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Scale contents to unit integral. A zero-integral density is left untouched.
    pub fn normalise(&mut self) {
        let total = self.integral();
        if total != 0.0 {
            self.scale(1.0 / total);
        }
    }

    /// Multiply all contents by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.contents.iter_mut().for_each(|c| *c *= factor);
    }

    /// Content of the bin containing `point`, 0 outside the binning.
    pub fn probability(&self, point: &[f64]) -> Result<f64> {
        Ok(self.axes.find_bin(point)?.map_or(0.0, |bin| self.contents[bin]))
    }
}
