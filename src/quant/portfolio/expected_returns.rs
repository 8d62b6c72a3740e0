//! # Expected Returns
//!
//! $$
//! \hat\mu_i=\Big(\prod_{t=1}^{n}(1+r_{i,t})\Big)^{f/n}-1
//! $$
//!
use crate::data::frame::PriceFrame;
use crate::error::QuantError;
use crate::error::Result;
use crate::error::ensure_series;

/// Compounded (geometric) annual return of every column.
pub fn mean_historical_return(prices: &PriceFrame, frequency: f64) -> Result<Vec<f64>> {
  if prices.n_assets() == 0 {
    return Err(QuantError::EmptyInput);
  }
  prices
    .columns()
    .iter()
    .map(|col| {
      ensure_series(col, 2)?;
      let n = (col.len() - 1) as f64;
      let growth = col[col.len() - 1] / col[0];
      if growth <= 0.0 {
        return Err(QuantError::InvalidParameter(
          "prices must be strictly positive".to_string(),
        ));
      }
      Ok(growth.powf(frequency / n) - 1.0)
    })
    .collect()
}

/// Arithmetic mean return scaled by `frequency`.
pub fn mean_arithmetic_return(prices: &PriceFrame, frequency: f64) -> Result<Vec<f64>> {
  prices
    .returns()
    .iter()
    .map(|r| {
      ensure_series(r, 1)?;
      Ok(r.iter().sum::<f64>() / r.len() as f64 * frequency)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::*;

  #[test]
  fn compounded_return_matches_growth() {
    let dates = (1..=3)
      .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
      .collect();
    let frame = PriceFrame::new(
      dates,
      vec!["A".into(), "B".into()],
      vec![vec![100.0, 110.0, 121.0], vec![50.0, 45.0, 50.0]],
    )
    .unwrap();
    let mu = mean_historical_return(&frame, 2.0).unwrap();
    // two periods per "year": growth 1.21 over one year
    assert_abs_diff_eq!(mu[0], 0.21, epsilon = 1e-12);
    assert_abs_diff_eq!(mu[1], 0.0, epsilon = 1e-12);

    let arith = mean_arithmetic_return(&frame, 2.0).unwrap();
    assert_abs_diff_eq!(arith[0], 0.2, epsilon = 1e-12);
  }
}
