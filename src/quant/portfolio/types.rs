//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Shared enums and result containers for portfolio optimization.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::QuantError;

/// Supported mean-variance objectives.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum OptimizationMethod {
  /// Tangency portfolio at the given risk-free rate.
  MaxSharpe { risk_free_rate: f64 },
  /// Global minimum variance.
  MinVolatility,
  /// `max μᵀw - ½δ wᵀΣw`.
  MaxQuadraticUtility { risk_aversion: f64 },
  /// Highest return with volatility at most `target_volatility`.
  EfficientRisk { target_volatility: f64 },
  /// Lowest volatility with return at least `target_return`.
  EfficientReturn { target_return: f64 },
}

impl OptimizationMethod {
  pub fn name(&self) -> &'static str {
    match self {
      Self::MaxSharpe { .. } => "max_sharpe",
      Self::MinVolatility => "min_volatility",
      Self::MaxQuadraticUtility { .. } => "max_quadratic_utility",
      Self::EfficientRisk { .. } => "efficient_risk",
      Self::EfficientReturn { .. } => "efficient_return",
    }
  }
}

impl FromStr for OptimizationMethod {
  type Err = QuantError;

  /// Parse a method name with default parameters (rf 0.02, δ 1, targets 0.15 / 0.1).
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().replace('-', "_").as_str() {
      "max_sharpe" => Ok(Self::MaxSharpe {
        risk_free_rate: 0.02,
      }),
      "min_volatility" | "min_vol" => Ok(Self::MinVolatility),
      "max_quadratic_utility" => Ok(Self::MaxQuadraticUtility { risk_aversion: 1.0 }),
      "efficient_risk" => Ok(Self::EfficientRisk {
        target_volatility: 0.15,
      }),
      "efficient_return" => Ok(Self::EfficientReturn { target_return: 0.1 }),
      _ => Err(QuantError::UnknownMethod(format!(
        "{s} (expected max_sharpe, min_volatility, max_quadratic_utility, efficient_risk or efficient_return)"
      ))),
    }
  }
}

impl fmt::Display for OptimizationMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Expected annual return, volatility and Sharpe ratio of a weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPerformance {
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
}

impl fmt::Display for PortfolioPerformance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Expected annual return: {:.1}%", 100.0 * self.expected_return)?;
    writeln!(f, "Annual volatility: {:.1}%", 100.0 * self.volatility)?;
    write!(f, "Sharpe Ratio: {:.2}", self.sharpe)
  }
}

/// Ticker-labelled portfolio weights.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Weights {
  tickers: Vec<String>,
  values: Vec<f64>,
}

impl Weights {
  pub fn new(tickers: Vec<String>, values: Vec<f64>) -> Result<Self, QuantError> {
    if tickers.len() != values.len() {
      return Err(QuantError::DimensionMismatch(format!(
        "{} tickers but {} weights",
        tickers.len(),
        values.len()
      )));
    }
    Ok(Self { tickers, values })
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn values(&self) -> &[f64] {
    &self.values
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn get(&self, ticker: &str) -> Option<f64> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.values[i])
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self
      .tickers
      .iter()
      .map(String::as_str)
      .zip(self.values.iter().copied())
  }

  pub fn sum(&self) -> f64 {
    self.values.iter().sum()
  }
}

impl fmt::Display for Weights {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, (t, w)) in self.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      write!(f, "{t}: {w:.5}")?;
    }
    Ok(())
  }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn method_names_parse() {
    assert_eq!(
      "min_volatility".parse::<OptimizationMethod>().unwrap(),
      OptimizationMethod::MinVolatility
    );
    assert_eq!(
      "max-sharpe".parse::<OptimizationMethod>().unwrap().name(),
      "max_sharpe"
    );
    assert!(matches!(
      "max_sortino".parse::<OptimizationMethod>(),
      Err(QuantError::UnknownMethod(_))
    ));
  }

  #[test]
  fn method_deserializes_from_json() {
    let m: OptimizationMethod =
      serde_json::from_str(r#"{"method": "efficient_risk", "target_volatility": 0.2}"#).unwrap();
    assert_eq!(m, OptimizationMethod::EfficientRisk { target_volatility: 0.2 });
  }

  #[test]
  fn weights_lookup_and_display() {
    let w = Weights::new(vec!["A".into(), "B".into()], vec![0.25, 0.75]).unwrap();
    assert_eq!(w.get("B"), Some(0.75));
    assert_eq!(w.get("C"), None);
    assert_eq!(w.to_string(), "A: 0.25000\nB: 0.75000");
    assert!(Weights::new(vec!["A".into()], vec![]).is_err());
  }
}
