//! # Backtest
//!
//! $$
//! V_t=c_t+\sum_i u_{i,t}P_{i,t},\qquad
//! u_{i,\tau}=\frac{w_{i,\tau}V_\tau}{P_{i,\tau}}\ \text{at rebalance dates }\tau
//! $$
//!
//! Periodic-rebalance backtest. Between rebalances the unit holdings are
//! fixed, so weights drift with prices; unallocated wealth is held as cash.

use chrono::NaiveDate;
use tracing::debug;
use tracing::info;

use super::portfolio::types::Weights;
use crate::data::frame::PriceFrame;
use crate::error::QuantError;
use crate::error::Result;
use crate::stats::summary::PerformanceSummary;
use crate::stats::summary::SummaryConfig;
use crate::stats::summary::summarize;

/// Equity curve of a finished run.
#[derive(Debug, Clone)]
pub struct BacktestResult {
  pub dates: Vec<NaiveDate>,
  pub equity: Vec<f64>,
  pub rebalances: Vec<(NaiveDate, Weights)>,
}

pub struct BacktestEngine {
  prices: PriceFrame,
  initial_capital: f64,
  result: Option<BacktestResult>,
}

impl BacktestEngine {
  pub fn new(prices: PriceFrame) -> Result<Self> {
    if prices.is_empty() || prices.n_assets() == 0 {
      return Err(QuantError::EmptyInput);
    }
    if prices
      .columns()
      .iter()
      .flatten()
      .any(|p| !p.is_finite() || *p <= 0.0)
    {
      return Err(QuantError::InvalidParameter(
        "prices must be finite and strictly positive".into(),
      ));
    }
    Ok(Self {
      prices,
      initial_capital: 1.0,
      result: None,
    })
  }

  pub fn with_initial_capital(mut self, capital: f64) -> Self {
    self.initial_capital = capital;
    self
  }

  /// Run from `start` to `end`, calling `weights_fn` on the price history up
  /// to and including every `rebalance_every`-th trading day.
  pub fn fit<F>(
    &mut self,
    start: NaiveDate,
    end: NaiveDate,
    rebalance_every: usize,
    weights_fn: F,
  ) -> Result<&BacktestResult>
  where
    F: Fn(&PriceFrame) -> Result<Weights>,
  {
    if rebalance_every == 0 {
      return Err(QuantError::InvalidParameter("rebalance_every must be positive".into()));
    }
    let dates = self.prices.dates();
    let lo = dates.partition_point(|d| *d < start);
    let hi = dates.partition_point(|d| *d <= end);
    if hi <= lo + 1 {
      return Err(QuantError::InsufficientData {
        needed: 2,
        got: hi.saturating_sub(lo),
      });
    }
    let first = dates[0];

    let n = self.prices.n_assets();
    let mut units = vec![0.0; n];
    let mut cash = self.initial_capital;
    let mut equity = Vec::with_capacity(hi - lo);
    let mut rebalances = Vec::new();

    for t in lo..hi {
      let row = self.prices.row(t);
      let value = cash + units.iter().zip(&row).map(|(u, p)| u * p).sum::<f64>();
      equity.push(value);

      if (t - lo) % rebalance_every == 0 && t + 1 < hi {
        let history = self.prices.slice(first, dates[t]);
        let w = weights_fn(&history)?;
        let mut invested = 0.0;
        for (i, ticker) in self.prices.tickers().iter().enumerate() {
          let wi = w.get(ticker).unwrap_or(0.0);
          units[i] = wi * value / row[i];
          invested += wi * value;
        }
        cash = value - invested;
        debug!(date = %dates[t], value, cash, "rebalanced");
        rebalances.push((dates[t], w));
      }
    }

    info!(
      periods = equity.len(),
      rebalances = rebalances.len(),
      final_value = equity.last().copied().unwrap_or(f64::NAN),
      "backtest finished"
    );
    self.result = Some(BacktestResult {
      dates: dates[lo..hi].to_vec(),
      equity,
      rebalances,
    });
    self
      .result
      .as_ref()
      .ok_or_else(|| QuantError::InvalidParameter("backtest produced no result".into()))
  }

  pub fn result(&self) -> Option<&BacktestResult> {
    self.result.as_ref()
  }

  /// Performance report of the last equity curve.
  pub fn summary(&self, cfg: &SummaryConfig) -> Result<PerformanceSummary> {
    let result = self
      .result
      .as_ref()
      .ok_or_else(|| QuantError::InvalidParameter("call fit before summary".into()))?;
    summarize(&result.equity, cfg)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::data::frame::gbm_frame;

  fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
  }

  fn two_assets() -> PriceFrame {
    PriceFrame::new(
      vec![date(2), date(3), date(4)],
      vec!["A".into(), "B".into()],
      vec![vec![100.0, 110.0, 121.0], vec![50.0, 50.0, 50.0]],
    )
    .unwrap()
  }

  fn half_half(_: &PriceFrame) -> Result<Weights> {
    Weights::new(vec!["A".into(), "B".into()], vec![0.5, 0.5])
  }

  #[test]
  fn buy_and_hold_drifts() {
    let mut engine = BacktestEngine::new(two_assets()).unwrap();
    let res = engine.fit(date(1), date(31), 100, half_half).unwrap();
    assert_eq!(res.rebalances.len(), 1);
    assert_abs_diff_eq!(res.equity[1], 1.05, epsilon = 1e-12);
    assert_abs_diff_eq!(res.equity[2], 1.105, epsilon = 1e-12);
  }

  #[test]
  fn daily_rebalance_resets_weights() {
    let mut engine = BacktestEngine::new(two_assets()).unwrap().with_initial_capital(100.0);
    let res = engine.fit(date(1), date(31), 1, half_half).unwrap();
    assert_eq!(res.rebalances.len(), 2);
    assert_abs_diff_eq!(res.equity[2], 110.25, epsilon = 1e-9);
  }

  #[test]
  fn unallocated_weight_stays_in_cash() {
    let mut engine = BacktestEngine::new(two_assets()).unwrap();
    let res = engine
      .fit(date(1), date(31), 5, |_| Weights::new(vec!["A".into()], vec![0.5]))
      .unwrap();
    assert_abs_diff_eq!(res.equity[2], 0.5 * 1.21 + 0.5, epsilon = 1e-12);
  }

  #[test]
  fn weights_fn_sees_only_the_past() {
    let prices = gbm_frame(&[0.05], &[0.2], date(1), 60, 3);
    let start = prices.dates()[20];
    let end = prices.dates()[50];
    let mut engine = BacktestEngine::new(prices).unwrap();
    engine
      .fit(start, end, 10, |history| {
        assert!(history.last_date().unwrap() < end);
        Weights::new(history.tickers().to_vec(), vec![1.0])
      })
      .unwrap();
    let res = engine.result().unwrap();
    assert_eq!(res.dates.first(), Some(&start));
    assert_eq!(res.rebalances.len(), 3);
    assert!(engine.summary(&SummaryConfig::default()).is_ok());
  }

  #[test]
  fn summary_requires_a_run() {
    let engine = BacktestEngine::new(two_assets()).unwrap();
    assert!(engine.summary(&SummaryConfig::default()).is_err());
  }
}
