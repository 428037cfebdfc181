//! Binning primitives: single axes and their ordered product.

use ns_core::{Error, Result};

/// One binned dimension defined by strictly increasing edges.
#[derive(Debug, Clone, PartialEq)]
pub struct BinAxis {
    name: String,
    edges: Vec<f64>,
}

impl BinAxis {
    /// Axis from explicit edges (at least 2, finite, strictly increasing).
    pub fn from_edges(name: impl Into<String>, edges: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if edges.len() < 2 {
            return Err(Error::Validation(format!(
                "axis '{name}' requires at least 2 bin edges, got {}",
                edges.len()
            )));
        }
        for i in 0..edges.len() {
            let e = edges[i];
            if !e.is_finite() {
                return Err(Error::Validation(format!(
                    "axis '{name}' edges[{i}] must be finite, got {e}"
                )));
            }
            if i > 0 && edges[i - 1] >= e {
                return Err(Error::Validation(format!(
                    "axis '{name}' edges must be strictly increasing, got edges[{}]={} and edges[{}]={}",
                    i - 1,
                    edges[i - 1],
                    i,
                    e
                )));
            }
        }
        Ok(Self { name, edges })
    }

    /// `n_bins` equal-width bins covering `[low, high)`.
    pub fn uniform(name: impl Into<String>, low: f64, high: f64, n_bins: usize) -> Result<Self> {
        let name = name.into();
        if n_bins == 0 {
            return Err(Error::Validation(format!("axis '{name}' requires n_bins > 0")));
        }
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(Error::Validation(format!(
                "axis '{name}' requires finite low < high, got ({low}, {high})"
            )));
        }
        let width = (high - low) / n_bins as f64;
        let mut edges: Vec<f64> = (0..n_bins).map(|i| low + i as f64 * width).collect();
        edges.push(high);
        Self::from_edges(name, edges)
    }

    /// Axis name (also used as its data-representation label).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Lower edge of the axis range.
    pub fn low(&self) -> f64 {
        self.edges[0]
    }

    /// Upper edge of the axis range.
    pub fn high(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Lower edge of bin `i`. Panics if `i >= n_bins`.
    #[inline]
    pub fn low_edge(&self, i: usize) -> f64 {
        self.edges[i]
    }

    /// Upper edge of bin `i`. Panics if `i >= n_bins`.
    #[inline]
    pub fn high_edge(&self, i: usize) -> f64 {
        self.edges[i + 1]
    }

    /// Centre of bin `i`. Panics if `i >= n_bins`.
    #[inline]
    pub fn centre(&self, i: usize) -> f64 {
        0.5 * (self.edges[i] + self.edges[i + 1])
    }

    /// Width of bin `i`. Panics if `i >= n_bins`.
    #[inline]
    pub fn width(&self, i: usize) -> f64 {
        self.edges[i + 1] - self.edges[i]
    }

    /// Bin containing `x`, or `None` outside `[low, high]`.
    ///
    /// The upper edge of the axis belongs to the last bin.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !x.is_finite() || x < self.low() || x > self.high() {
            return None;
        }
        if x >= self.high() {
            return Some(self.n_bins() - 1);
        }
        // `k` is the number of edges <= x, so the bin index is k-1.
        let k = self.edges.partition_point(|e| *e <= x);
        Some(k - 1)
    }
}

/// Ordered product of [`BinAxis`] dimensions with flat bin addressing.
///
/// Flat indices are row-major: the last axis varies fastest. An empty collection
/// has zero bins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisCollection {
    axes: Vec<BinAxis>,
    strides: Vec<usize>,
    n_bins: usize,
}

impl AxisCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection from a list of axes.
    pub fn from_axes(axes: impl IntoIterator<Item = BinAxis>) -> Result<Self> {
        let mut c = Self::new();
        for a in axes {
            c.add_axis(a)?;
        }
        Ok(c)
    }

    /// Append an axis. Axis names must be unique.
    pub fn add_axis(&mut self, axis: BinAxis) -> Result<()> {
        if self.axes.iter().any(|a| a.name() == axis.name()) {
            return Err(Error::Validation(format!(
                "axis '{}' already present in collection",
                axis.name()
            )));
        }
        self.axes.push(axis);
        self.recompute();
        Ok(())
    }

    fn recompute(&mut self) {
        let n = self.axes.len();
        self.strides = vec![1; n];
        for d in (0..n.saturating_sub(1)).rev() {
            self.strides[d] = self.strides[d + 1] * self.axes[d + 1].n_bins();
        }
        self.n_bins = if n == 0 { 0 } else { self.axes.iter().map(BinAxis::n_bins).product() };
    }

    /// Number of dimensions.
    pub fn n_dims(&self) -> usize {
        self.axes.len()
    }

    /// Total number of bins (product over axes; 0 when empty).
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// All axes in order.
    pub fn axes(&self) -> &[BinAxis] {
        &self.axes
    }

    /// Axis at position `dim`.
    pub fn axis(&self, dim: usize) -> Result<&BinAxis> {
        self.axes.get(dim).ok_or_else(|| {
            Error::NotFound(format!("axis {dim} requested from a {}-dimensional collection", self.n_dims()))
        })
    }

    /// Axis names in order.
    pub fn names(&self) -> Vec<String> {
        self.axes.iter().map(|a| a.name().to_string()).collect()
    }

    /// New collection holding the axes at `dims`, in the given order.
    pub fn sub_collection(&self, dims: &[usize]) -> Result<Self> {
        let mut out = Self::new();
        for &d in dims {
            out.add_axis(self.axis(d)?.clone())?;
        }
        Ok(out)
    }

    fn check_bin(&self, bin: usize) -> Result<()> {
        if bin >= self.n_bins {
            return Err(Error::NotFound(format!(
                "bin {bin} out of range for axis collection with {} bins",
                self.n_bins
            )));
        }
        Ok(())
    }

    /// Flat index of a per-axis index vector.
    pub fn flatten(&self, indices: &[usize]) -> Result<usize> {
        if indices.len() != self.n_dims() {
            return Err(Error::Dimension(format!(
                "flatten expects {} indices, got {}",
                self.n_dims(),
                indices.len()
            )));
        }
        let mut flat = 0;
        for (d, (&i, axis)) in indices.iter().zip(&self.axes).enumerate() {
            if i >= axis.n_bins() {
                return Err(Error::NotFound(format!(
                    "index {i} out of range on axis {d} ('{}') with {} bins",
                    axis.name(),
                    axis.n_bins()
                )));
            }
            flat += i * self.strides[d];
        }
        Ok(flat)
    }

    /// Per-axis index vector of a flat index.
    pub fn unflatten(&self, bin: usize) -> Result<Vec<usize>> {
        let mut out = vec![0; self.n_dims()];
        self.unflatten_into(bin, &mut out)?;
        Ok(out)
    }

    /// [`AxisCollection::unflatten`] into a caller buffer of length `n_dims`.
    pub fn unflatten_into(&self, bin: usize, out: &mut [usize]) -> Result<()> {
        self.check_bin(bin)?;
        self.check_buffer(out.len())?;
        for d in 0..self.n_dims() {
            out[d] = (bin / self.strides[d]) % self.axes[d].n_bins();
        }
        Ok(())
    }

    /// Index along axis `dim` of flat bin `bin`.
    pub fn unflatten_index(&self, bin: usize, dim: usize) -> Result<usize> {
        self.check_bin(bin)?;
        let axis = self.axis(dim)?;
        Ok((bin / self.strides[dim]) % axis.n_bins())
    }

    fn check_buffer(&self, len: usize) -> Result<()> {
        if len != self.n_dims() {
            return Err(Error::Dimension(format!(
                "buffer of length {len} for a {}-dimensional axis collection",
                self.n_dims()
            )));
        }
        Ok(())
    }

    fn per_axis_into(&self, bin: usize, out: &mut [f64], f: impl Fn(&BinAxis, usize) -> f64) -> Result<()> {
        self.check_bin(bin)?;
        self.check_buffer(out.len())?;
        for d in 0..self.n_dims() {
            let i = (bin / self.strides[d]) % self.axes[d].n_bins();
            out[d] = f(&self.axes[d], i);
        }
        Ok(())
    }

    /// Bin centre of flat bin `bin`, one coordinate per axis.
    pub fn bin_centres(&self, bin: usize) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.n_dims()];
        self.bin_centres_into(bin, &mut out)?;
        Ok(out)
    }

    /// [`AxisCollection::bin_centres`] into a caller buffer.
    pub fn bin_centres_into(&self, bin: usize, out: &mut [f64]) -> Result<()> {
        self.per_axis_into(bin, out, BinAxis::centre)
    }

    /// Low edges of flat bin `bin`.
    pub fn bin_low_edges(&self, bin: usize) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.n_dims()];
        self.bin_low_edges_into(bin, &mut out)?;
        Ok(out)
    }

    /// [`AxisCollection::bin_low_edges`] into a caller buffer.
    pub fn bin_low_edges_into(&self, bin: usize, out: &mut [f64]) -> Result<()> {
        self.per_axis_into(bin, out, BinAxis::low_edge)
    }

    /// High edges of flat bin `bin`.
    pub fn bin_high_edges(&self, bin: usize) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.n_dims()];
        self.bin_high_edges_into(bin, &mut out)?;
        Ok(out)
    }

    /// [`AxisCollection::bin_high_edges`] into a caller buffer.
    pub fn bin_high_edges_into(&self, bin: usize, out: &mut [f64]) -> Result<()> {
        self.per_axis_into(bin, out, BinAxis::high_edge)
    }

    /// Flat bin containing `point` (one coordinate per axis), `None` if outside.
    pub fn find_bin(&self, point: &[f64]) -> Result<Option<usize>> {
        self.check_buffer(point.len())?;
        if self.n_dims() == 0 {
            return Ok(None);
        }
        let mut flat = 0;
        for (d, (&x, axis)) in point.iter().zip(&self.axes).enumerate() {
            match axis.find_bin(x) {
                Some(i) => flat += i * self.strides[d],
                None => return Ok(None),
            }
        }
        Ok(Some(flat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid() -> AxisCollection {
        AxisCollection::from_axes([
            BinAxis::uniform("a", 0.0, 2.0, 2).unwrap(),
            BinAxis::uniform("b", 0.0, 3.0, 3).unwrap(),
            BinAxis::from_edges("c", vec![0.0, 1.0, 4.0, 10.0, 20.0]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_axis_validation() {
        assert!(BinAxis::from_edges("x", vec![0.0]).is_err());
        assert!(BinAxis::from_edges("x", vec![0.0, 0.0]).is_err());
        assert!(BinAxis::from_edges("x", vec![0.0, f64::NAN]).is_err());
        assert!(BinAxis::uniform("x", 1.0, 0.0, 3).is_err());
        assert!(BinAxis::uniform("x", 0.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_axis_lookup() {
        let a = BinAxis::from_edges("x", vec![0.0, 1.0, 4.0]).unwrap();
        assert_eq!(a.n_bins(), 2);
        assert_eq!(a.centre(1), 2.5);
        assert_eq!(a.width(1), 3.0);
        assert_eq!(a.find_bin(0.0), Some(0));
        assert_eq!(a.find_bin(1.0), Some(1));
        assert_eq!(a.find_bin(4.0), Some(1));
        assert_eq!(a.find_bin(-0.1), None);
        assert_eq!(a.find_bin(4.1), None);
    }

    #[test]
    fn test_last_axis_fastest() {
        let c = grid();
        assert_eq!(c.n_bins(), 24);
        assert_eq!(c.flatten(&[0, 0, 1]).unwrap(), 1);
        assert_eq!(c.flatten(&[0, 1, 0]).unwrap(), 4);
        assert_eq!(c.flatten(&[1, 0, 0]).unwrap(), 12);
        assert_eq!(c.unflatten(23).unwrap(), vec![1, 2, 3]);
        assert_eq!(c.unflatten_index(13, 2).unwrap(), 1);
    }

    #[test]
    fn test_edges_and_centres() {
        let c = grid();
        let bin = c.flatten(&[1, 2, 2]).unwrap();
        assert_eq!(c.bin_low_edges(bin).unwrap(), vec![1.0, 2.0, 4.0]);
        assert_eq!(c.bin_high_edges(bin).unwrap(), vec![2.0, 3.0, 10.0]);
        assert_eq!(c.bin_centres(bin).unwrap(), vec![1.5, 2.5, 7.0]);
        assert_eq!(c.find_bin(&[1.5, 2.5, 7.0]).unwrap(), Some(bin));
        assert_eq!(c.find_bin(&[1.5, 2.5, 70.0]).unwrap(), None);
    }

    #[test]
    fn test_out_of_range_errors() {
        let c = grid();
        assert!(matches!(c.unflatten(24), Err(Error::NotFound(_))));
        assert!(matches!(c.flatten(&[0, 3, 0]), Err(Error::NotFound(_))));
        assert!(matches!(c.flatten(&[0, 0]), Err(Error::Dimension(_))));
        assert!(matches!(AxisCollection::new().bin_centres(0), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_sub_collection_and_duplicates() {
        let c = grid();
        let sub = c.sub_collection(&[2, 0]).unwrap();
        assert_eq!(sub.names(), vec!["c", "a"]);
        assert_eq!(sub.n_bins(), 8);
        let mut dup = sub.clone();
        assert!(dup.add_axis(BinAxis::uniform("a", 0.0, 1.0, 1).unwrap()).is_err());
    }

    proptest! {
        #[test]
        fn prop_flatten_unflatten_bijection(bin in 0usize..24) {
            let c = grid();
            let idx = c.unflatten(bin).unwrap();
            prop_assert_eq!(c.flatten(&idx).unwrap(), bin);
        }
    }
}
