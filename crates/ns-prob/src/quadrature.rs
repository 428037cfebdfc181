//! Gauss-Legendre quadrature over axis-aligned boxes.
//!
//! Multi-dimensional integrals use the tensor product of 1-D rules. Each axis can
//! additionally be split into equal sub-intervals (composite rule), which is
//! cheaper than raising the order when the integrand has structure on a scale
//! smaller than the box.

use ns_core::{Error, Result};

/// A 1-D Gauss-Legendre rule on `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Build an `n`-node rule. `n` must be at least 1.
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::Validation("Gauss-Legendre order must be >= 1".into()));
        }
        let (nodes, weights) = nodes_weights(n);
        Ok(Self { nodes, weights })
    }

    /// Number of nodes.
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes on `[-1, 1]`.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Weights matching [`GaussLegendre::nodes`] (sum to 2).
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Integrate `f` over `[a, b]` with `n_sub` equal sub-intervals.
    pub fn integrate_1d<F: FnMut(f64) -> f64>(&self, a: f64, b: f64, n_sub: usize, mut f: F) -> f64 {
        let n_sub = n_sub.max(1);
        let step = (b - a) / n_sub as f64;
        let half = 0.5 * step;
        let mut acc = 0.0;
        for s in 0..n_sub {
            let mid = a + (s as f64 + 0.5) * step;
            for (x, w) in self.nodes.iter().zip(&self.weights) {
                acc += w * f(mid + half * x);
            }
        }
        acc * half
    }

    /// Integrate `f` over the box `[low, high]` (tensor-product rule).
    ///
    /// `f` receives the evaluation point; the slice is reused between calls.
    pub fn integrate_box<F: FnMut(&[f64]) -> f64>(
        &self,
        low: &[f64],
        high: &[f64],
        n_sub: usize,
        mut f: F,
    ) -> Result<f64> {
        if low.len() != high.len() {
            return Err(Error::Dimension(format!(
                "integration box edges disagree: {} low edges, {} high edges",
                low.len(),
                high.len()
            )));
        }
        let n_dims = low.len();
        if n_dims == 0 {
            return Ok(0.0);
        }
        let n_sub = n_sub.max(1);

        // Per-axis absolute nodes and weights (already scaled to the sub-interval length).
        let mut axis_nodes: Vec<Vec<f64>> = Vec::with_capacity(n_dims);
        let mut axis_weights: Vec<Vec<f64>> = Vec::with_capacity(n_dims);
        for d in 0..n_dims {
            let (a, b) = (low[d], high[d]);
            if !(a.is_finite() && b.is_finite()) {
                return Err(Error::Validation(format!(
                    "quadrature requires finite bounds, got [{a}, {b}] on axis {d}"
                )));
            }
            let step = (b - a) / n_sub as f64;
            let half = 0.5 * step;
            let mut xs = Vec::with_capacity(n_sub * self.order());
            let mut ws = Vec::with_capacity(n_sub * self.order());
            for s in 0..n_sub {
                let mid = a + (s as f64 + 0.5) * step;
                for (x, w) in self.nodes.iter().zip(&self.weights) {
                    xs.push(mid + half * x);
                    ws.push(w * half);
                }
            }
            axis_nodes.push(xs);
            axis_weights.push(ws);
        }

        let per_axis = axis_nodes[0].len();
        let mut counter = vec![0usize; n_dims];
        let mut point: Vec<f64> = axis_nodes.iter().map(|xs| xs[0]).collect();
        let mut acc = 0.0;
        loop {
            let mut w = 1.0;
            for d in 0..n_dims {
                w *= axis_weights[d][counter[d]];
            }
            acc += w * f(&point);

            // Odometer increment, last axis fastest.
            let mut d = n_dims;
            loop {
                if d == 0 {
                    return Ok(acc);
                }
                d -= 1;
                counter[d] += 1;
                if counter[d] < per_axis {
                    point[d] = axis_nodes[d][counter[d]];
                    break;
                }
                counter[d] = 0;
                point[d] = axis_nodes[d][0];
            }
        }
    }
}

/// Compute Gauss-Legendre nodes and weights on `[-1, 1]` for the given order.
///
/// Newton iteration on the roots of `P_n`, weights from `P'_n`. Only half the roots are
/// computed; the rest follow by symmetry.
fn nodes_weights(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0f64; n];
    let mut weights = vec![0.0f64; n];
    if n == 1 {
        weights[0] = 2.0;
        return (nodes, weights);
    }

    let nf = n as f64;
    let legendre = |x: f64| {
        let mut p0 = 1.0f64;
        let mut p1 = x;
        for j in 2..=n {
            let jf = j as f64;
            let p2 = ((2.0 * jf - 1.0) * x * p1 - (jf - 1.0) * p0) / jf;
            p0 = p1;
            p1 = p2;
        }
        // (P_n, P'_n)
        (p1, nf * (x * p1 - p0) / (x * x - 1.0))
    };

    for i in 0..n.div_ceil(2) {
        let mut x = ((std::f64::consts::PI * (i as f64 + 0.75)) / (nf + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre(x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre(x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}
