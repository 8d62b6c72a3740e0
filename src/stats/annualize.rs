//! # Annualize
//!
//! $$
//! R_a = \Big(\prod_{t=1}^n (1+r_t)\Big)^{m/n} - 1,\qquad \sigma_a = \sigma\sqrt{m}
//! $$
//!
use super::sample::std_dev;

/// Geometric annualised return of per-period returns.
pub fn annualised_returns(returns: &[f64], periods_per_year: f64) -> f64 {
  if returns.is_empty() {
    return f64::NAN;
  }
  let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
  growth.powf(periods_per_year / returns.len() as f64) - 1.0
}

/// Sample (ddof = 1) volatility scaled by `sqrt(periods_per_year)`.
pub fn annualised_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
  std_dev(returns, 1) * periods_per_year.sqrt()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn constant_returns_compound() {
    let r = vec![0.01; 12];
    assert_abs_diff_eq!(
      annualised_returns(&r, 12.0),
      1.01_f64.powi(12) - 1.0,
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(annualised_volatility(&r, 12.0), 0.0, epsilon = 1e-12);
  }

  #[test]
  fn volatility_scales_with_sqrt_time() {
    let r = [0.01, -0.01, 0.02, -0.02];
    let daily = annualised_volatility(&r, 1.0);
    assert_abs_diff_eq!(annualised_volatility(&r, 252.0), daily * 252.0_f64.sqrt(), epsilon = 1e-12);
  }
}
