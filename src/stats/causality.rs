//! # Granger Causality
//!
//! $$
//! F=\frac{(SSR_r-SSR_u)/p}{SSR_u/(n-2p-1)},\qquad
//! \chi^2 = n\,\frac{SSR_r-SSR_u}{SSR_u}
//! $$
//!
//! Tests whether lags of `x` improve the autoregressive prediction of `y`.

use serde::Deserialize;
use serde::Serialize;
use statrs::distribution::ChiSquared;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::FisherSnedecor;
use tracing::debug;

use super::ols::ols;
use crate::error::QuantError;
use crate::error::Result;
use crate::error::ensure_series;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GrangerConfig {
  /// Largest lag order tested; every order `1..=max_lag` is reported.
  pub max_lag: usize,
  /// Significance level for `rejects_null`.
  pub alpha: f64,
}

impl Default for GrangerConfig {
  fn default() -> Self {
    Self {
      max_lag: 4,
      alpha: 0.05,
    }
  }
}

/// SSR-based tests for a single lag order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrangerLagResult {
  pub lag: usize,
  pub f_statistic: f64,
  pub f_p_value: f64,
  pub df_num: usize,
  pub df_denom: usize,
  pub chi2_statistic: f64,
  pub chi2_p_value: f64,
  /// "x does not Granger-cause y" rejected by the F test.
  pub rejects_null: bool,
}

/// Granger test of `x -> y` for every lag order up to `cfg.max_lag`.
pub fn granger_causality(y: &[f64], x: &[f64], cfg: GrangerConfig) -> Result<Vec<GrangerLagResult>> {
  if y.len() != x.len() {
    return Err(QuantError::DimensionMismatch(format!(
      "series lengths differ: {} vs {}",
      y.len(),
      x.len()
    )));
  }
  if cfg.max_lag == 0 {
    return Err(QuantError::InvalidParameter("max_lag must be at least 1".into()));
  }
  let min_n = 3 * cfg.max_lag + 2;
  ensure_series(y, min_n)?;
  ensure_series(x, min_n)?;

  (1..=cfg.max_lag)
    .map(|p| granger_at_lag(y, x, p, cfg.alpha))
    .collect()
}

fn granger_at_lag(y: &[f64], x: &[f64], p: usize, alpha: f64) -> Result<GrangerLagResult> {
  let n_total = y.len();
  let lhs: Vec<f64> = y[p..].to_vec();
  let mut restricted = Vec::with_capacity(n_total - p);
  let mut unrestricted = Vec::with_capacity(n_total - p);

  for t in p..n_total {
    let mut row = Vec::with_capacity(1 + 2 * p);
    row.push(1.0);
    row.extend((1..=p).map(|i| y[t - i]));
    restricted.push(row.clone());
    row.extend((1..=p).map(|i| x[t - i]));
    unrestricted.push(row);
  }

  let ssr_r = ols(&lhs, &restricted)?.sse;
  let ssr_u = ols(&lhs, &unrestricted)?.sse;
  let n = lhs.len();
  let df_denom = n - 2 * p - 1;

  if ssr_u <= 0.0 {
    return Err(QuantError::Singular(format!(
      "unrestricted model fits exactly at lag {p}"
    )));
  }

  let f_statistic = ((ssr_r - ssr_u) / p as f64) / (ssr_u / df_denom as f64);
  let chi2_statistic = n as f64 * (ssr_r - ssr_u) / ssr_u;

  let f_dist = FisherSnedecor::new(p as f64, df_denom as f64)
    .map_err(|e| QuantError::InvalidParameter(e.to_string()))?;
  let chi2_dist =
    ChiSquared::new(p as f64).map_err(|e| QuantError::InvalidParameter(e.to_string()))?;

  let f_p_value = f_dist.sf(f_statistic.max(0.0));
  let chi2_p_value = chi2_dist.sf(chi2_statistic.max(0.0));
  debug!(lag = p, f_statistic, f_p_value, "granger");

  Ok(GrangerLagResult {
    lag: p,
    f_statistic,
    f_p_value,
    df_num: p,
    df_denom,
    chi2_statistic,
    chi2_p_value,
    rejects_null: f_p_value < alpha,
  })
}
