//! # Value at Risk
//!
//! $$
//! \mathrm{VaR}_\alpha = q_\alpha(r),\qquad \mathrm{CVaR}_\alpha=\mathbb E[r\mid r<\mathrm{VaR}_\alpha]
//! $$
//!
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;

use super::per_column;
use super::sample::mean;
use super::sample::percentile;
use super::sample::std_dev;
use crate::data::frame::PriceFrame;
use crate::data::returns::pct_change;
use crate::error::QuantError;
use crate::error::Result;
use crate::error::ensure_series;

/// Default tail probability.
pub const DEFAULT_CUTOFF: f64 = 0.05;

fn validated_returns(prices: &[f64], cutoff: f64) -> Result<Vec<f64>> {
  if !(cutoff > 0.0 && cutoff < 1.0) {
    return Err(QuantError::InvalidParameter(format!(
      "cutoff must be in (0, 1), got {cutoff}"
    )));
  }
  ensure_series(prices, 2)?;
  Ok(pct_change(prices))
}

/// Historical VaR: the `cutoff` quantile of period returns (a loss is negative).
pub fn value_at_risk(prices: &[f64], cutoff: f64) -> Result<f64> {
  let returns = validated_returns(prices, cutoff)?;
  Ok(percentile(&returns, 100.0 * cutoff))
}

/// Mean of the returns strictly below the historical VaR at the same cutoff.
///
/// `NaN` when no return lies below the VaR.
pub fn conditional_value_at_risk(prices: &[f64], cutoff: f64) -> Result<f64> {
  let returns = validated_returns(prices, cutoff)?;
  let var = percentile(&returns, 100.0 * cutoff);
  let tail: Vec<f64> = returns.into_iter().filter(|r| *r < var).collect();
  if tail.is_empty() {
    return Ok(f64::NAN);
  }
  Ok(mean(&tail))
}

/// Gaussian VaR `mean + sigma * z_cutoff`.
pub fn parametric_value_at_risk(prices: &[f64], cutoff: f64) -> Result<f64> {
  let returns = validated_returns(prices, cutoff)?;
  ensure_series(&returns, 2)?;
  let normal = Normal::new(0.0, 1.0).expect("standard normal parameters are valid");
  Ok(mean(&returns) + std_dev(&returns, 1) * normal.inverse_cdf(cutoff))
}

pub fn value_at_risk_frame(frame: &PriceFrame, cutoff: f64) -> Result<Vec<(String, f64)>> {
  per_column(frame, |p| value_at_risk(p, cutoff))
}

pub fn conditional_value_at_risk_frame(
  frame: &PriceFrame,
  cutoff: f64,
) -> Result<Vec<(String, f64)>> {
  per_column(frame, |p| conditional_value_at_risk(p, cutoff))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn prices_from(returns: &[f64]) -> Vec<f64> {
    let mut p = vec![1.0];
    for r in returns {
      let last = *p.last().unwrap();
      p.push(last * (1.0 + r));
    }
    p
  }

  #[test]
  fn var_is_lower_quantile() {
    let r: Vec<f64> = (1..=100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
    let p = prices_from(&r);
    let var = value_at_risk(&p, 0.05).unwrap();
    // 5th percentile of -0.049..=0.050
    assert_abs_diff_eq!(var, -0.04405, epsilon = 1e-9);
  }

  #[test]
  fn cvar_is_below_var() {
    let r: Vec<f64> = (1..=100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
    let p = prices_from(&r);
    let var = value_at_risk(&p, 0.05).unwrap();
    let cvar = conditional_value_at_risk(&p, 0.05).unwrap();
    assert!(cvar < var);
    // the five returns -0.049..=-0.045 sit below the VaR
    assert_abs_diff_eq!(cvar, -0.047, epsilon = 1e-9);
  }

  #[test]
  fn rejects_invalid_cutoff() {
    let err = value_at_risk(&[1.0, 1.1, 1.2], 1.5).unwrap_err();
    assert!(matches!(err, QuantError::InvalidParameter(_)));
  }

  #[test]
  fn parametric_var_is_negative_for_centered_returns() {
    let p = prices_from(&[0.01, -0.01, 0.02, -0.02, 0.0]);
    assert!(parametric_value_at_risk(&p, 0.05).unwrap() < 0.0);
  }
}
