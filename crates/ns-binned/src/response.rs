//! Response matrices: sparse linear maps over the flat bin space.
//!
//! Convention: entry `(row, col)` is the mass moved from source bin `col` into
//! destination bin `row`, so [`ResponseMatrix::apply`] computes `out = R · in`.

use crate::axis::AxisCollection;
use crate::density::BinnedDensity;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix, SparseEntryMut};
use ns_core::{Error, Result};

/// Square sparse operator over the flat bins of an [`AxisCollection`].
///
/// Created empty; it becomes usable once [`ResponseMatrix::set_axes`] has sized it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMatrix {
    axes: AxisCollection,
    n_bins: usize,
    n_dims: usize,
    response: CsrMatrix<f64>,
}

impl Default for ResponseMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseMatrix {
    /// Unconfigured matrix (zero bins, zero dimensions).
    pub fn new() -> Self {
        Self {
            axes: AxisCollection::new(),
            n_bins: 0,
            n_dims: 0,
            response: CsrMatrix::zeros(0, 0),
        }
    }

    /// All-zero matrix sized for `axes`.
    pub fn with_axes(axes: &AxisCollection) -> Self {
        let mut m = Self::new();
        m.set_axes(axes);
        m
    }

    /// Store a copy of `axes` and reset to an all-zero `n_bins × n_bins` matrix.
    pub fn set_axes(&mut self, axes: &AxisCollection) {
        self.axes = axes.clone();
        self.n_bins = axes.n_bins();
        self.n_dims = axes.n_dims();
        self.response = CsrMatrix::zeros(self.n_bins, self.n_bins);
    }

    /// Binning the matrix was sized for.
    pub fn axes(&self) -> &AxisCollection {
        &self.axes
    }

    /// Number of bins (matrix side length).
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Number of dimensions of the binning.
    pub fn n_dims(&self) -> usize {
        self.n_dims
    }

    /// Underlying sparse matrix.
    pub fn response(&self) -> &CsrMatrix<f64> {
        &self.response
    }

    /// Number of explicitly stored entries.
    pub fn nnz(&self) -> usize {
        self.response.nnz()
    }

    /// Replace the sparse matrix wholesale. No size validation is done here.
    pub fn set_response(&mut self, response: CsrMatrix<f64>) {
        self.response = response;
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.n_bins || col >= self.n_bins {
            return Err(Error::NotFound(format!(
                "attempted out of bounds access on response matrix ({row}, {col}) with {} bins; is it initialised with axes?",
                self.n_bins
            )));
        }
        Ok(())
    }

    /// A matrix installed through [`ResponseMatrix::set_response`] may be smaller than
    /// the binning.
    fn check_stored(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.response.nrows() || col >= self.response.ncols() {
            return Err(Error::Dimension(format!(
                "response entry ({row}, {col}) outside stored {}x{} matrix built for {} bins",
                self.response.nrows(),
                self.response.ncols(),
                self.n_bins
            )));
        }
        Ok(())
    }

    /// Entry `(row, col)`; absent entries read as 0.
    pub fn component(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        self.check_stored(row, col)?;
        Ok(self.response.get_entry(row, col).map_or(0.0, |e| e.into_value()))
    }

    /// Write entry `(row, col)`.
    ///
    /// Overwriting a stored entry is O(1); inserting a new one shifts the row storage.
    pub fn set_component(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        self.check_stored(row, col)?;
        if let Some(SparseEntryMut::NonZero(v)) = self.response.get_entry_mut(row, col) {
            *v = value;
            return Ok(());
        }
        if value == 0.0 {
            return Ok(());
        }

        let (nrows, ncols) = (self.response.nrows(), self.response.ncols());
        let (mut offsets, mut indices, mut values) =
            std::mem::replace(&mut self.response, CsrMatrix::zeros(0, 0)).disassemble();
        let (start, end) = (offsets[row], offsets[row + 1]);
        let pos = start + indices[start..end].partition_point(|&c| c < col);
        indices.insert(pos, col);
        values.insert(pos, value);
        for o in &mut offsets[row + 1..] {
            *o += 1;
        }
        self.response = CsrMatrix::try_from_csr_data(nrows, ncols, offsets, indices, values)
            .map_err(|e| Error::Validation(format!("failed to insert response entry: {e}")))?;
        Ok(())
    }

    /// Rebuild the matrix from parallel triplet arrays.
    ///
    /// Entries not listed are zero. Repeated `(row, col)` pairs are summed.
    pub fn set_components(&mut self, rows: &[usize], cols: &[usize], values: &[f64]) -> Result<()> {
        if rows.len() != values.len() || cols.len() != values.len() {
            return Err(Error::Dimension(format!(
                "response triplets disagree: {} rows, {} cols, {} values",
                rows.len(),
                cols.len(),
                values.len()
            )));
        }
        if let Some((r, c)) = rows
            .iter()
            .zip(cols)
            .find(|&(&r, &c)| r >= self.n_bins || c >= self.n_bins)
        {
            return self.check_index(*r, *c);
        }
        let coo = CooMatrix::try_from_triplets(
            self.n_bins,
            self.n_bins,
            rows.to_vec(),
            cols.to_vec(),
            values.to_vec(),
        )
        .map_err(|e| Error::Validation(format!("invalid response triplets: {e}")))?;
        self.response = CsrMatrix::from(&coo);
        Ok(())
    }

    /// Reset to all-zero at the current size. No-op while unconfigured.
    pub fn set_zeros(&mut self) {
        if self.n_bins == 0 {
            return;
        }
        self.response = CsrMatrix::zeros(self.n_bins, self.n_bins);
    }

    /// Apply the matrix to a density: `out = R · contents`.
    ///
    /// The result uses this matrix's binning and, when the dimensionality agrees, the
    /// operand's observable labels.
    pub fn apply(&self, density: &BinnedDensity) -> Result<BinnedDensity> {
        if self.n_dims == 0 {
            return Err(Error::Dimension(
                "response matrix has 0 dimensions; have you set the axes?".into(),
            ));
        }
        if density.n_dims() < self.n_dims {
            return Err(Error::Dimension(format!(
                "density dimensionality ({}) too small for response matrix ({}) to act on",
                density.n_dims(),
                self.n_dims
            )));
        }
        if self.response.ncols() != density.n_bins() || self.response.nrows() != self.n_bins {
            return Err(Error::Dimension(format!(
                "matrix multiplication failed: density has {} bins, but matrix built for {} ({}x{} stored)",
                density.n_bins(),
                self.axes.n_bins(),
                self.response.nrows(),
                self.response.ncols()
            )));
        }

        let contents = DVector::from_column_slice(density.bin_contents());
        let smeared = &self.response * &contents;

        let mut out = BinnedDensity::new(self.axes.clone());
        // Labels of extra operand dimensions have no axis in the output.
        if density.data_rep().len() == self.n_dims {
            out.set_data_rep(density.data_rep().clone())?;
        } else {
            log::debug!(
                "response output keeps axis labels: operand has {} labels for {} dimensions",
                density.data_rep().len(),
                self.n_dims
            );
        }
        out.set_bin_contents(smeared.as_slice().to_vec())?;
        Ok(out)
    }

    /// Right-multiply in place: `R ← R · other`.
    ///
    /// Applying the result equals applying `other` first, then the previous `R`.
    pub fn combine(&mut self, other: &ResponseMatrix) -> Result<()> {
        if self.response.ncols() != other.response.nrows() {
            return Err(Error::Dimension(format!(
                "cannot combine response matrices: {}x{} · {}x{}",
                self.response.nrows(),
                self.response.ncols(),
                other.response.nrows(),
                other.response.ncols()
            )));
        }
        self.response = &self.response * &other.response;
        Ok(())
    }

    /// Sum of each column (mass retained per source bin).
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.response.ncols()];
        for (_, col, v) in self.response.triplet_iter() {
            sums[col] += *v;
        }
        sums
    }
}
