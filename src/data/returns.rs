//! # Returns
//!
//! $$
//! r_t = \frac{P_t}{P_{t-1}} - 1,\qquad \ell_t = \ln\frac{P_t}{P_{t-1}}
//! $$
//!

/// Simple period returns of a price path. The first observation is dropped.
pub fn pct_change(prices: &[f64]) -> Vec<f64> {
  prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Log returns of a price path. Pairs with a non-positive price are skipped.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
  let mut out = Vec::with_capacity(prices.len().saturating_sub(1));
  for i in 1..prices.len() {
    if prices[i - 1] > 0.0 && prices[i] > 0.0 {
      out.push((prices[i] / prices[i - 1]).ln());
    }
  }
  out
}

/// Compounded wealth path `cumprod(1 + r) - 1`.
pub fn cumulative_from_returns(returns: &[f64]) -> Vec<f64> {
  let mut wealth = 1.0;
  returns
    .iter()
    .map(|r| {
      wealth *= 1.0 + r;
      wealth - 1.0
    })
    .collect()
}

/// Per-period rate equivalent to an annual rate compounded `periods_per_year` times.
pub fn per_period_rate(annual_rate: f64, periods_per_year: f64) -> f64 {
  (1.0 + annual_rate).powf(1.0 / periods_per_year) - 1.0
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn pct_change_drops_first_observation() {
    let r = pct_change(&[100.0, 110.0, 99.0]);
    assert_eq!(r.len(), 2);
    assert_abs_diff_eq!(r[0], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(r[1], -0.1, epsilon = 1e-12);
  }

  #[test]
  fn log_returns_skip_non_positive_prices() {
    let r = log_returns(&[1.0, 0.0, 2.0, 4.0]);
    assert_eq!(r.len(), 1);
    assert_abs_diff_eq!(r[0], 2.0_f64.ln(), epsilon = 1e-12);
  }

  #[test]
  fn cumulative_matches_price_ratio() {
    let prices = [50.0, 55.0, 44.0, 66.0];
    let cum = cumulative_from_returns(&pct_change(&prices));
    assert_abs_diff_eq!(*cum.last().unwrap(), 66.0 / 50.0 - 1.0, epsilon = 1e-12);
  }

  #[test]
  fn per_period_rate_compounds_back() {
    let rf = per_period_rate(0.05, 252.0);
    assert_abs_diff_eq!((1.0 + rf).powf(252.0), 1.05, epsilon = 1e-12);
  }
}
