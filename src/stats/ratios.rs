//! # Financial Ratios
//!
//! $$
//! \text{Sharpe}=\frac{R_a^{\,excess}}{\sigma_a},\qquad
//! \text{Sortino}=\frac{m\,\overline{(r-\tau)}}{\sqrt{m}\,\sqrt{\overline{\min(r-\tau,0)^2}}},\qquad
//! \Omega=\frac{\sum (r-\tau)^+}{\sum (r-\tau)^-}
//! $$
//!
//! Risk-adjusted performance ratios computed from price paths. Annual rates
//! (`risk_free`, `required_return`) are de-annualised by geometric compounding.

use super::annualize::annualised_returns;
use super::annualize::annualised_volatility;
use super::moments::maximum_drawdown;
use super::per_column;
use super::sample::mean;
use super::sample::percentile;
use crate::data::frame::PriceFrame;
use crate::data::returns::pct_change;
use crate::data::returns::per_period_rate;
use crate::error::Result;
use crate::error::ensure_series;

fn returns_of(prices: &[f64]) -> Result<Vec<f64>> {
  ensure_series(prices, 3)?;
  Ok(pct_change(prices))
}

fn excess_returns(returns: &[f64], risk_free: f64, periods_per_year: f64) -> Vec<f64> {
  let rf = per_period_rate(risk_free, periods_per_year);
  returns.iter().map(|r| r - rf).collect()
}

/// Annualised Sharpe ratio.
pub fn sharpe_ratio(prices: &[f64], risk_free: f64, periods_per_year: f64) -> Result<f64> {
  let returns = returns_of(prices)?;
  let excess = excess_returns(&returns, risk_free, periods_per_year);
  Ok(annualised_returns(&excess, periods_per_year) / annualised_volatility(&returns, periods_per_year))
}

/// Annualised excess return over the magnitude of the maximum drawdown.
///
/// `NaN` when the path never draws down.
pub fn calmar_ratio(prices: &[f64], periods_per_year: f64, risk_free: f64) -> Result<f64> {
  let returns = returns_of(prices)?;
  let excess = excess_returns(&returns, risk_free, periods_per_year);
  let mdd = maximum_drawdown(prices)?;
  if mdd == 0.0 {
    return Ok(f64::NAN);
  }
  Ok(annualised_returns(&excess, periods_per_year) / mdd.abs())
}

/// Probability-weighted gains over losses relative to a threshold.
pub fn omega_ratio(
  prices: &[f64],
  risk_free: f64,
  periods_per_year: f64,
  required_return: f64,
) -> Result<f64> {
  let returns = returns_of(prices)?;
  let threshold = if periods_per_year == 1.0 {
    required_return
  } else if required_return <= -1.0 {
    return Ok(f64::NAN);
  } else {
    per_period_rate(required_return, periods_per_year)
  };
  let rf = per_period_rate(risk_free, periods_per_year);

  let (mut gains, mut losses) = (0.0, 0.0);
  for r in returns {
    let d = r - rf - threshold;
    if d > 0.0 {
      gains += d;
    } else {
      losses -= d;
    }
  }

  Ok(if losses > 0.0 { gains / losses } else { f64::NAN })
}

/// Annualised Sortino ratio against a per-period required return.
pub fn sortino_ratio(prices: &[f64], periods_per_year: f64, required_return: f64) -> Result<f64> {
  let returns = returns_of(prices)?;
  let adjusted: Vec<f64> = returns.iter().map(|r| r - required_return).collect();
  let avg_annual = mean(&adjusted) * periods_per_year;

  let downside: Vec<f64> = adjusted.iter().map(|d| d.min(0.0).powi(2)).collect();
  let downside_risk = mean(&downside).sqrt() * periods_per_year.sqrt();
  if downside_risk == 0.0 {
    return Ok(f64::NAN);
  }

  Ok(avg_annual / downside_risk)
}

/// Ratio of the right (95th) to the left (5th) return percentile.
pub fn tail_ratio(prices: &[f64]) -> Result<f64> {
  let returns = returns_of(prices)?;
  Ok(percentile(&returns, 95.0).abs() / percentile(&returns, 5.0).abs())
}

pub fn sharpe_ratio_frame(
  frame: &PriceFrame,
  risk_free: f64,
  periods_per_year: f64,
) -> Result<Vec<(String, f64)>> {
  per_column(frame, |p| sharpe_ratio(p, risk_free, periods_per_year))
}

pub fn calmar_ratio_frame(
  frame: &PriceFrame,
  periods_per_year: f64,
  risk_free: f64,
) -> Result<Vec<(String, f64)>> {
  per_column(frame, |p| calmar_ratio(p, periods_per_year, risk_free))
}

pub fn omega_ratio_frame(
  frame: &PriceFrame,
  risk_free: f64,
  periods_per_year: f64,
  required_return: f64,
) -> Result<Vec<(String, f64)>> {
  per_column(frame, |p| omega_ratio(p, risk_free, periods_per_year, required_return))
}

pub fn sortino_ratio_frame(
  frame: &PriceFrame,
  periods_per_year: f64,
  required_return: f64,
) -> Result<Vec<(String, f64)>> {
  per_column(frame, |p| sortino_ratio(p, periods_per_year, required_return))
}

pub fn tail_ratio_frame(frame: &PriceFrame) -> Result<Vec<(String, f64)>> {
  per_column(frame, tail_ratio)
}
