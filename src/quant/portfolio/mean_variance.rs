//! # Mean-Variance
//!
//! $$
//! \hat\mu=\text{mean historical return},\qquad
//! \hat\Sigma=\text{Ledoit-Wolf}
//! $$
//!
//! Estimates expected returns and a shrunk covariance from a price frame and
//! hands them to an [`EfficientFrontier`].

use nalgebra::DMatrix;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::efficient_frontier::EfficientFrontier;
use super::efficient_frontier::WeightBounds;
use super::expected_returns::mean_historical_return;
use super::risk_models::ledoit_wolf;
use super::types::OptimizationMethod;
use super::types::PortfolioPerformance;
use super::types::Weights;
use crate::data::frame::PriceFrame;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanVarianceConfig {
  /// Periods per year used to annualise estimates.
  pub frequency: f64,
  pub bounds: WeightBounds,
  /// Annual risk-free rate; `None` means zero.
  pub risk_free_rate: Option<f64>,
}

impl Default for MeanVarianceConfig {
  fn default() -> Self {
    Self {
      frequency: 252.0,
      bounds: WeightBounds::default(),
      risk_free_rate: None,
    }
  }
}

#[derive(Debug, Clone)]
pub struct MeanVariance {
  prices: PriceFrame,
  risk_free_rate: f64,
  shrinkage: f64,
  frontier: EfficientFrontier,
}

impl MeanVariance {
  pub fn new(prices: PriceFrame, cfg: MeanVarianceConfig) -> Result<Self> {
    let mu = mean_historical_return(&prices, cfg.frequency)?;
    let cov = ledoit_wolf(&prices, cfg.frequency)?;
    debug!(
      assets = prices.n_assets(),
      periods = prices.len(),
      shrinkage = cov.shrinkage,
      "mean-variance estimates"
    );
    let frontier = EfficientFrontier::new(prices.tickers().to_vec(), mu, cov.matrix, &cfg.bounds)?;

    Ok(Self {
      prices,
      risk_free_rate: cfg.risk_free_rate.unwrap_or(0.0),
      shrinkage: cov.shrinkage,
      frontier,
    })
  }

  pub fn fit(&mut self, method: OptimizationMethod) -> Result<Weights> {
    self.frontier.optimize(method)
  }

  /// Performance of the last fitted weights at [`Self::risk_free_rate`].
  pub fn stats(&self) -> Result<PortfolioPerformance> {
    self.frontier.portfolio_performance(self.risk_free_rate())
  }

  /// Risk-free rate rounded to two decimals.
  pub fn risk_free_rate(&self) -> f64 {
    (self.risk_free_rate * 100.0).round() / 100.0
  }

  pub fn historical_prices(&self) -> &PriceFrame {
    &self.prices
  }

  pub fn expected_returns(&self) -> &[f64] {
    self.frontier.expected_returns()
  }

  pub fn covariance_matrix(&self) -> &DMatrix<f64> {
    self.frontier.covariance()
  }

  pub fn shrinkage(&self) -> f64 {
    self.shrinkage
  }

  pub fn frontier(&self) -> &EfficientFrontier {
    &self.frontier
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::*;
  use crate::data::frame::gbm_frame;

  fn model(risk_free_rate: Option<f64>) -> MeanVariance {
    let prices = gbm_frame(
      &[0.08, 0.12, 0.05],
      &[0.15, 0.25, 0.1],
      NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
      300,
      21,
    );
    let cfg = MeanVarianceConfig {
      risk_free_rate,
      ..Default::default()
    };
    MeanVariance::new(prices, cfg).unwrap()
  }

  #[test]
  fn estimates_have_frame_shape() {
    let mv = model(None);
    assert_eq!(mv.expected_returns().len(), 3);
    assert_eq!(mv.covariance_matrix().shape(), (3, 3));
    assert!((0.0..=1.0).contains(&mv.shrinkage()));
    assert_eq!(mv.historical_prices().len(), 300);
    assert_eq!(mv.risk_free_rate(), 0.0);
  }

  #[test]
  fn risk_free_rate_is_rounded() {
    assert_abs_diff_eq!(model(Some(0.04321)).risk_free_rate(), 0.04, epsilon = 1e-12);
  }

  #[test]
  fn min_volatility_is_fully_invested() {
    let mut mv = model(None);
    assert!(mv.stats().is_err());
    let w = mv.fit(OptimizationMethod::MinVolatility).unwrap();
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-6);
    assert!(w.values().iter().all(|v| *v >= -1e-9));

    let perf = mv.stats().unwrap();
    let vols: Vec<f64> = (0..3).map(|i| mv.covariance_matrix()[(i, i)].sqrt()).collect();
    let least = vols.iter().cloned().fold(f64::INFINITY, f64::min);
    assert!(perf.volatility <= least + 1e-6);
  }
}
