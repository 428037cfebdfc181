//! Convolution systematics: smearing kernels turned into response matrices.
//!
//! The kernel only acts on a subset of the density's dimensions. Two full-space bins
//! that agree on every other dimension ("compatible" bins) exchange mass with the
//! same probability as their projections onto the acted-on sub-space, so the kernel
//! is integrated once on the small sub-space binning and the result is scattered
//! into the full matrix.

use crate::axis::AxisCollection;
use crate::data_rep::DataRepresentation;
use crate::density::BinnedDensity;
use crate::response::ResponseMatrix;
use nalgebra::DMatrix;
use ns_core::{Error, Fittable, Result};
use ns_prob::{ConditionalDistribution, JumpDist, Kernel};

/// Lifecycle of a [`Convolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvolutionState {
    /// No axes assigned.
    Unconfigured,
    /// Axes assigned, matrix not built (or invalidated by new axes).
    AxesSet,
    /// Matrix built by [`Convolution::construct`].
    Constructed,
}

/// Binning-only bookkeeping, independent of kernel parameters.
#[derive(Debug, Clone)]
struct CompatibilityCache {
    /// Full-space dimensions the kernel acts on, in kernel order.
    relative_indices: Vec<usize>,
    /// Binning of the acted-on dimensions.
    sys_axes: AxisCollection,
    /// Full flat bin → flat bin in `sys_axes`.
    sys_bins: Vec<usize>,
    /// Bins sharing all untouched coordinates, ascending. Indexed by group id.
    groups: Vec<Vec<usize>>,
    /// Full flat bin → group id.
    group_of: Vec<usize>,
}

/// Builder of the response matrix for a convolution systematic.
///
/// Owns its kernel exclusively: every setter clones the distribution it is handed.
/// Changing kernel parameters does not rebuild the matrix; call
/// [`Convolution::construct`] again (see [`Convolution::is_stale`]).
#[derive(Debug, Clone)]
pub struct Convolution {
    name: String,
    pdf_mapping: ResponseMatrix,
    dist: Option<Box<dyn ConditionalDistribution>>,
    data_rep: DataRepresentation,
    pdf_data_rep: DataRepresentation,
    cache: Option<CompatibilityCache>,
    constructed: bool,
    stale: bool,
}

impl Default for Convolution {
    fn default() -> Self {
        Self::new()
    }
}

impl Convolution {
    /// Owner tag used for parameter names and error prefixes.
    pub const DEFAULT_NAME: &'static str = "Convolution";

    /// Unconfigured convolution.
    pub fn new() -> Self {
        Self::with_name(Self::DEFAULT_NAME)
    }

    /// Unconfigured convolution with a custom owner tag.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pdf_mapping: ResponseMatrix::new(),
            dist: None,
            data_rep: DataRepresentation::default(),
            pdf_data_rep: DataRepresentation::default(),
            cache: None,
            constructed: false,
            stale: false,
        }
    }

    /// Owner tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConvolutionState {
        if self.pdf_mapping.n_dims() == 0 {
            ConvolutionState::Unconfigured
        } else if self.constructed {
            ConvolutionState::Constructed
        } else {
            ConvolutionState::AxesSet
        }
    }

    /// `true` if kernel parameters or the kernel itself changed after the last build.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Assign the full-space binning. Resets the matrix and the compatibility cache.
    pub fn set_axes(&mut self, axes: &AxisCollection) {
        self.pdf_mapping.set_axes(axes);
        self.cache = None;
        self.constructed = false;
        self.stale = false;
    }

    /// Labels of the dimensions the kernel acts on. Empty means all dimensions.
    pub fn set_data_rep(&mut self, rep: DataRepresentation) {
        self.data_rep = rep;
        self.invalidate_cache();
    }

    /// Labels of the full density's dimensions. Empty means the axis names.
    pub fn set_pdf_data_rep(&mut self, rep: DataRepresentation) {
        self.pdf_data_rep = rep;
        self.invalidate_cache();
    }

    /// Labels of the acted-on dimensions.
    pub fn data_rep(&self) -> &DataRepresentation {
        &self.data_rep
    }

    /// Labels of the full density.
    pub fn pdf_data_rep(&self) -> &DataRepresentation {
        &self.pdf_data_rep
    }

    fn invalidate_cache(&mut self) {
        self.cache = None;
        if self.constructed {
            self.stale = true;
        }
    }

    fn mark_changed(&mut self) {
        if self.constructed {
            self.stale = true;
        }
    }

    /// Use a position-independent kernel, `P(x | x₂) = P(x - x₂)`. The kernel is cloned.
    pub fn set_function(&mut self, kernel: &dyn Kernel) {
        self.dist = Some(Box::new(JumpDist::from_boxed(kernel.clone_box())));
        self.mark_changed();
    }

    /// Use a general conditional distribution. The distribution is cloned.
    pub fn set_conditional_distribution(&mut self, dist: &dyn ConditionalDistribution) {
        self.dist = Some(dist.clone_box());
        self.mark_changed();
    }

    /// The owned conditional distribution, if set.
    pub fn conditional_distribution(&self) -> Option<&dyn ConditionalDistribution> {
        self.dist.as_deref()
    }

    /// The full-space response matrix.
    pub fn pdf_mapping(&self) -> &ResponseMatrix {
        &self.pdf_mapping
    }

    fn relative_indices(&self) -> Result<Vec<usize>> {
        let axes = self.pdf_mapping.axes();
        if self.data_rep.is_empty() {
            return Ok((0..axes.n_dims()).collect());
        }
        let full = if self.pdf_data_rep.is_empty() {
            DataRepresentation::new(axes.names())?
        } else {
            self.pdf_data_rep.clone()
        };
        if full.len() != axes.n_dims() {
            return Err(Error::Dimension(format!(
                "{}: density representation has {} labels for {} axes",
                self.name,
                full.len(),
                axes.n_dims()
            )));
        }
        self.data_rep.relative_indices(&full)
    }

    /// Derive the acted-on sub-binning, the full → sub bin map and the compatibility
    /// groups. Done lazily by [`Convolution::construct`]; depends only on the binning.
    pub fn cache_compatible_bins(&mut self) -> Result<()> {
        if self.pdf_mapping.n_dims() == 0 {
            return Err(Error::Logic(format!(
                "{}::cache_compatible_bins() : axes not set",
                self.name
            )));
        }
        let relative_indices = self.relative_indices()?;
        let axes = self.pdf_mapping.axes();
        let n_bins = axes.n_bins();
        let n_dims = axes.n_dims();

        let sys_axes = axes.sub_collection(&relative_indices)?;
        let other_dims: Vec<usize> =
            (0..n_dims).filter(|d| !relative_indices.contains(d)).collect();
        let other_axes = axes.sub_collection(&other_dims)?;
        let n_groups = other_axes.n_bins().max(1);

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_groups];
        let mut group_of = vec![0usize; n_bins];
        let mut sys_bins = vec![0usize; n_bins];

        let mut full_idx = vec![0usize; n_dims];
        let mut sys_idx = vec![0usize; relative_indices.len()];
        let mut other_idx = vec![0usize; other_dims.len()];
        for bin in 0..n_bins {
            axes.unflatten_into(bin, &mut full_idx)?;
            for (k, &d) in relative_indices.iter().enumerate() {
                sys_idx[k] = full_idx[d];
            }
            for (k, &d) in other_dims.iter().enumerate() {
                other_idx[k] = full_idx[d];
            }
            sys_bins[bin] = sys_axes.flatten(&sys_idx)?;
            let group = if other_dims.is_empty() { 0 } else { other_axes.flatten(&other_idx)? };
            // Ascending bin order keeps each group sorted.
            groups[group].push(bin);
            group_of[bin] = group;
        }

        log::debug!(
            "{}: cached compatible bins (n_bins={}, sys_n_bins={}, groups={})",
            self.name,
            n_bins,
            sys_axes.n_bins(),
            n_groups
        );

        self.cache = Some(CompatibilityCache {
            relative_indices,
            sys_axes,
            sys_bins,
            groups,
            group_of,
        });
        Ok(())
    }

    /// `true` once the compatibility cache exists.
    pub fn has_cached_compatible_bins(&self) -> bool {
        self.cache.is_some()
    }

    fn cache(&self) -> Result<&CompatibilityCache> {
        self.cache.as_ref().ok_or_else(|| {
            Error::Logic(format!("{}: compatible bins have not been cached", self.name))
        })
    }

    /// Whether full bins `i` and `j` agree on every dimension the kernel does not act on.
    ///
    /// Evaluated directly from the binning (it does not consult the cache).
    pub fn bins_compatible(&self, i: usize, j: usize) -> Result<bool> {
        let axes = self.pdf_mapping.axes();
        if let Some(bin) = [i, j].into_iter().find(|&b| b >= axes.n_bins()) {
            return Err(Error::NotFound(format!(
                "bin {bin} out of range for {} bins",
                axes.n_bins()
            )));
        }
        let relative_indices = self.relative_indices()?;
        for d in (0..axes.n_dims()).filter(|d| !relative_indices.contains(d)) {
            if axes.unflatten_index(i, d)? != axes.unflatten_index(j, d)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Full bins compatible with `bin` (including itself), ascending.
    pub fn compatible_bins(&self, bin: usize) -> Result<&[usize]> {
        let cache = self.cache()?;
        let group = cache.group_of.get(bin).ok_or_else(|| {
            Error::NotFound(format!("bin {bin} out of range for {} bins", cache.group_of.len()))
        })?;
        Ok(&cache.groups[*group])
    }

    /// Binning of the acted-on dimensions (after caching).
    pub fn sys_axes(&self) -> Option<&AxisCollection> {
        self.cache.as_ref().map(|c| &c.sys_axes)
    }

    /// Full flat bin → acted-on sub-space flat bin (after caching).
    pub fn sys_bins(&self) -> Option<&[usize]> {
        self.cache.as_ref().map(|c| c.sys_bins.as_slice())
    }

    /// Full-space dimensions the kernel acts on (after caching).
    pub fn relative_dims(&self) -> Option<&[usize]> {
        self.cache.as_ref().map(|c| c.relative_indices.as_slice())
    }

    /// (Re)build the full response matrix from the current kernel parameters.
    pub fn construct(&mut self) -> Result<()> {
        if self.dist.is_none() || self.pdf_mapping.n_dims() == 0 {
            return Err(Error::Logic(format!(
                "{}::construct() : tried to construct convolution without axes or function/distribution, or both",
                self.name
            )));
        }
        if self.cache.is_none() {
            self.cache_compatible_bins()?;
        }
        let cache = self.cache()?;
        let dist = self.dist.as_deref().ok_or_else(|| {
            Error::Logic(format!("{}::construct() : distribution not set", self.name))
        })?;

        let sub = sub_response(dist, &cache.sys_axes)?;

        let n_pairs: usize = cache.groups.iter().map(|g| g.len() * g.len()).sum();
        let mut rows = Vec::with_capacity(n_pairs);
        let mut cols = Vec::with_capacity(n_pairs);
        let mut values = Vec::with_capacity(n_pairs);
        for (src, &group) in cache.group_of.iter().enumerate() {
            let sys_src = cache.sys_bins[src];
            for &dest in &cache.groups[group] {
                let v = sub[(cache.sys_bins[dest], sys_src)];
                if v != 0.0 {
                    rows.push(dest);
                    cols.push(src);
                    values.push(v);
                }
            }
        }

        self.pdf_mapping.set_components(&rows, &cols, &values)?;
        self.constructed = true;
        self.stale = false;
        log::debug!(
            "{}: constructed response matrix ({} bins, {} non-zero)",
            self.name,
            self.pdf_mapping.n_bins(),
            self.pdf_mapping.nnz()
        );
        Ok(())
    }

    /// Apply the built matrix to a density.
    pub fn apply(&self, density: &BinnedDensity) -> Result<BinnedDensity> {
        if !self.constructed {
            return Err(Error::Logic(format!(
                "{}: response matrix has not been constructed",
                self.name
            )));
        }
        if self.stale {
            log::warn!(
                "{}: applying a response matrix built from outdated parameters; call construct()",
                self.name
            );
        }
        self.pdf_mapping.apply(density)
    }
}

/// Transition matrix on the acted-on sub-space, `(dest, source)` indexed.
///
/// Entry `(d, s)` is the kernel mass inside bin `d` given the centre of bin `s`.
fn sub_response(dist: &dyn ConditionalDistribution, sys_axes: &AxisCollection) -> Result<DMatrix<f64>> {
    let n_dims = sys_axes.n_dims();
    if dist.n_dims() != n_dims {
        return Err(Error::Dimension(format!(
            "distribution is {}-dimensional but the systematic acts on {} dimensions",
            dist.n_dims(),
            n_dims
        )));
    }
    let n = sys_axes.n_bins();

    let mut low_edges = vec![0.0; n * n_dims];
    let mut high_edges = vec![0.0; n * n_dims];
    for bin in 0..n {
        let span = bin * n_dims..(bin + 1) * n_dims;
        sys_axes.bin_low_edges_into(bin, &mut low_edges[span.clone()])?;
        sys_axes.bin_high_edges_into(bin, &mut high_edges[span])?;
    }

    let mut sub = DMatrix::zeros(n, n);
    let mut centre = vec![0.0; n_dims];
    for src in 0..n {
        sys_axes.bin_centres_into(src, &mut centre)?;
        for dest in 0..n {
            let span = dest * n_dims..(dest + 1) * n_dims;
            sub[(dest, src)] = dist.integral(&low_edges[span.clone()], &high_edges[span], &centre)?;
        }
    }
    Ok(sub)
}

impl Fittable for Convolution {
    fn make_fittable(&mut self) {
        if let Some(dist) = self.dist.as_mut() {
            dist.make_fittable();
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        self.dist
            .as_ref()
            .map(|d| d.parameter_names().into_iter().map(|p| format!("{} : {p}", self.name)).collect())
            .unwrap_or_default()
    }

    fn parameters(&self) -> Vec<f64> {
        self.dist.as_ref().map(|d| d.parameters()).unwrap_or_default()
    }

    fn parameter_count(&self) -> usize {
        self.dist.as_ref().map_or(0, |d| d.parameter_count())
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        let Some(dist) = self.dist.as_mut() else {
            return Err(Error::Logic(format!("{}: no distribution set", self.name)));
        };
        dist.set_parameters(params).map_err(|e| e.with_owner(&self.name))?;
        self.mark_changed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::BinAxis;
    use approx::assert_relative_eq;
    use ns_prob::{GaussianKernel, ResolutionGaussian};
    use proptest::prelude::*;

    fn one_d(n: usize) -> AxisCollection {
        AxisCollection::from_axes([BinAxis::uniform("x", 0.0, n as f64, n).unwrap()]).unwrap()
    }

    fn two_d() -> AxisCollection {
        AxisCollection::from_axes([
            BinAxis::uniform("a", 0.0, 2.0, 2).unwrap(),
            BinAxis::uniform("b", 0.0, 2.0, 2).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_state_machine() {
        let mut conv = Convolution::new();
        assert_eq!(conv.state(), ConvolutionState::Unconfigured);
        assert!(matches!(conv.construct(), Err(Error::Logic(_))));

        conv.set_axes(&one_d(3));
        assert_eq!(conv.state(), ConvolutionState::AxesSet);
        assert!(matches!(conv.construct(), Err(Error::Logic(_))));

        conv.set_function(&GaussianKernel::centred(1, 0.5).unwrap());
        conv.construct().unwrap();
        assert_eq!(conv.state(), ConvolutionState::Constructed);

        conv.set_axes(&one_d(4));
        assert_eq!(conv.state(), ConvolutionState::AxesSet);
        assert!(!conv.has_cached_compatible_bins());
    }

    #[test]
    fn test_kernel_without_axes_is_logic_error() {
        let mut conv = Convolution::new();
        conv.set_function(&GaussianKernel::centred(1, 0.5).unwrap());
        let err = conv.construct().unwrap_err();
        assert!(matches!(err, Error::Logic(_)));
    }

    #[test]
    fn test_compatible_bins_follow_untouched_axis() {
        let mut conv = Convolution::new();
        conv.set_axes(&two_d());
        conv.set_data_rep(DataRepresentation::new(["a"]).unwrap());
        conv.cache_compatible_bins().unwrap();

        let axes = two_d();
        let b00 = axes.flatten(&[0, 0]).unwrap();
        let b10 = axes.flatten(&[1, 0]).unwrap();
        let b01 = axes.flatten(&[0, 1]).unwrap();
        let b11 = axes.flatten(&[1, 1]).unwrap();
        assert_eq!(conv.compatible_bins(b00).unwrap(), &[b00, b10]);
        assert_eq!(conv.compatible_bins(b11).unwrap(), &[b01, b11]);
        assert_eq!(conv.sys_axes().unwrap().names(), vec!["a"]);
        assert_eq!(conv.sys_bins().unwrap()[b10], 1);
        assert_eq!(conv.sys_bins().unwrap()[b01], 0);
        assert!(conv.bins_compatible(b00, b10).unwrap());
        assert!(!conv.bins_compatible(b00, b01).unwrap());
    }

    #[test]
    fn test_full_coverage_makes_every_bin_compatible() {
        let mut conv = Convolution::new();
        conv.set_axes(&two_d());
        conv.cache_compatible_bins().unwrap();
        assert_eq!(conv.compatible_bins(2).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(conv.relative_dims().unwrap(), &[0, 1]);
        assert!(matches!(conv.compatible_bins(4), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unknown_label_fails_on_cache() {
        let mut conv = Convolution::new();
        conv.set_axes(&two_d());
        conv.set_data_rep(DataRepresentation::new(["energy"]).unwrap());
        assert!(matches!(conv.cache_compatible_bins(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_kernel_dimensionality_must_match_acted_dims() {
        let mut conv = Convolution::new();
        conv.set_axes(&two_d());
        conv.set_data_rep(DataRepresentation::new(["b"]).unwrap());
        conv.set_function(&GaussianKernel::centred(2, 0.5).unwrap());
        assert!(matches!(conv.construct(), Err(Error::Dimension(_))));
    }

    #[test]
    fn test_entries_are_dest_by_source() {
        let mut conv = Convolution::new();
        conv.set_axes(&one_d(3));
        // Bias pushes everything one bin up.
        conv.set_conditional_distribution(
            &ResolutionGaussian::new(vec![1.0], vec![0.01], vec![0.0]).unwrap(),
        );
        conv.construct().unwrap();
        let m = conv.pdf_mapping();
        assert_relative_eq!(m.component(1, 0).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.component(2, 1).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.component(0, 1).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_construct_is_idempotent() {
        let mut conv = Convolution::new();
        conv.set_axes(&two_d());
        conv.set_data_rep(DataRepresentation::new(["b"]).unwrap());
        conv.set_function(&GaussianKernel::centred(1, 0.7).unwrap());
        conv.construct().unwrap();
        let first = conv.pdf_mapping().clone();
        conv.construct().unwrap();
        assert_eq!(&first, conv.pdf_mapping());
    }

    #[test]
    fn test_parameter_change_marks_stale_until_rebuilt() {
        let mut conv = Convolution::new();
        conv.set_axes(&one_d(5));
        conv.set_function(&GaussianKernel::centred(1, 0.3).unwrap());
        conv.construct().unwrap();
        let before = conv.pdf_mapping().component(2, 2).unwrap();

        conv.set_parameters(&[0.0, 1.5]).unwrap();
        assert!(conv.is_stale());
        assert_eq!(conv.pdf_mapping().component(2, 2).unwrap(), before);

        conv.construct().unwrap();
        assert!(!conv.is_stale());
        assert!(conv.pdf_mapping().component(2, 2).unwrap() < before);
    }

    #[test]
    fn test_set_function_clones_caller_kernel() {
        let mut kernel = GaussianKernel::centred(1, 0.3).unwrap();
        let mut conv = Convolution::new();
        conv.set_function(&kernel);
        kernel.set_parameters(&[1.0, 2.0]).unwrap();
        assert_eq!(conv.parameters(), vec![0.0, 0.3]);
    }

    #[test]
    fn test_parameter_names_are_prefixed() {
        let mut conv = Convolution::with_name("smear");
        assert!(conv.parameter_names().is_empty());
        assert!(matches!(conv.set_parameters(&[1.0]), Err(Error::Logic(_))));
        conv.set_function(&GaussianKernel::centred(1, 0.3).unwrap());
        conv.make_fittable();
        assert_eq!(conv.parameter_names(), vec!["smear : mean_0", "smear : sigma_0"]);
        assert_eq!(conv.parameter_count(), 2);
    }

    #[test]
    fn test_apply_before_construct_is_logic_error() {
        let mut conv = Convolution::new();
        conv.set_axes(&one_d(3));
        let density = BinnedDensity::new(one_d(3));
        assert!(matches!(conv.apply(&density), Err(Error::Logic(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]

        #[test]
        fn prop_compatibility_symmetric_and_reflexive(acted in 0usize..3) {
            let axes = AxisCollection::from_axes([
                BinAxis::uniform("a", 0.0, 1.0, 2).unwrap(),
                BinAxis::uniform("b", 0.0, 1.0, 3).unwrap(),
                BinAxis::uniform("c", 0.0, 1.0, 2).unwrap(),
            ])
            .unwrap();
            let label = ["a", "b", "c"][acted];
            let mut conv = Convolution::new();
            conv.set_axes(&axes);
            conv.set_data_rep(DataRepresentation::new([label]).unwrap());
            conv.cache_compatible_bins().unwrap();

            for i in 0..axes.n_bins() {
                let ci = conv.compatible_bins(i).unwrap().to_vec();
                prop_assert!(ci.contains(&i));
                for j in 0..axes.n_bins() {
                    let cj = conv.compatible_bins(j).unwrap();
                    prop_assert_eq!(ci.contains(&j), cj.contains(&i));
                    prop_assert_eq!(ci.contains(&j), conv.bins_compatible(i, j).unwrap());
                }
            }
        }
    }
}
