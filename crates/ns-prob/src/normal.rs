//! Normal distribution utilities.

use ns_core::{Error, Result};
use statrs::function::erf::erfc;

fn check_sigma(sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(Error::Validation(format!("sigma must be finite and > 0, got {}", sigma)));
    }
    Ok(())
}

/// Standard normal CDF `Φ(z)`.
///
/// Written via `erfc` so the lower tail keeps full relative precision.
#[inline]
pub fn standard_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Probability mass of `N(mu, sigma)` inside `[low, high]`.
///
/// Infinite bounds are allowed. Returns 0 for an empty interval.
pub fn interval_mass(low: f64, high: f64, mu: f64, sigma: f64) -> Result<f64> {
    check_sigma(sigma)?;
    if !(high > low) {
        return Ok(0.0);
    }
    let z_lo = (low - mu) / sigma;
    let z_hi = (high - mu) / sigma;
    // Both bounds in the upper tail: use survival functions to avoid 1 - 1 cancellation.
    let mass = if z_lo > 0.0 {
        standard_cdf(-z_lo) - standard_cdf(-z_hi)
    } else {
        standard_cdf(z_hi) - standard_cdf(z_lo)
    };
    Ok(mass.max(0.0))
}
