//! # ARIMA
//!
//! $$
//! w_t=\Delta^d y_t,\qquad
//! w_t=c+x_t^\top\beta+\sum_{i=1}^{p}\phi_i w_{t-i}+\sum_{j=1}^{q}\theta_j\varepsilon_{t-j}+\varepsilon_t
//! $$
//!
//! Conditional-sum-of-squares estimation with Nelder-Mead, information
//! criteria and a grid-search order selection.

use std::fmt;
use std::str::FromStr;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use tracing::debug;
use tracing::info;

use crate::error::QuantError;
use crate::error::Result;
use crate::error::ensure_series;
use crate::stats::sample::mean;
use crate::stats::sample::std_dev;
use crate::stats::stationarity::adf::AdfConfig;
use crate::stats::stationarity::adf::adf_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArimaOrder {
  pub p: usize,
  pub d: usize,
  pub q: usize,
}

impl ArimaOrder {
  pub fn new(p: usize, d: usize, q: usize) -> Self {
    Self { p, d, q }
  }
}

impl fmt::Display for ArimaOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {}, {})", self.p, self.d, self.q)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationCriterion {
  Aic,
  Bic,
  Hqic,
}

impl FromStr for InformationCriterion {
  type Err = QuantError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "aic" => Ok(Self::Aic),
      "bic" => Ok(Self::Bic),
      "hqic" => Ok(Self::Hqic),
      _ => Err(QuantError::UnknownMethod(s.to_string())),
    }
  }
}

fn difference_n(y: &[f64], d: usize) -> Vec<f64> {
  let mut out = y.to_vec();
  for _ in 0..d {
    out = out.windows(2).map(|w| w[1] - w[0]).collect();
  }
  out
}

struct CssCost<'a> {
  w: &'a [f64],
  exog: &'a [Vec<f64>],
  p: usize,
  q: usize,
}

impl CssCost<'_> {
  /// In-sample innovations for the parameter vector `[c, beta.., phi.., theta..]`.
  fn innovations(&self, params: &[f64]) -> Vec<f64> {
    let k = self.exog.len();
    let c = params[0];
    let beta = &params[1..1 + k];
    let phi = &params[1 + k..1 + k + self.p];
    let theta = &params[1 + k + self.p..];

    let n = self.w.len();
    let mut eps = vec![0.0; n];
    for t in self.p..n {
      let mut fitted = c;
      for (b, col) in beta.iter().zip(self.exog) {
        fitted += b * col[t];
      }
      for (i, ph) in phi.iter().enumerate() {
        fitted += ph * self.w[t - 1 - i];
      }
      for (j, th) in theta.iter().enumerate() {
        if t > j {
          fitted += th * eps[t - 1 - j];
        }
      }
      eps[t] = self.w[t] - fitted;
    }
    eps.drain(..self.p);
    eps
  }
}

impl CostFunction for CssCost<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let css: f64 = self.innovations(x).iter().map(|e| e * e).sum();
    Ok(if css.is_finite() { css } else { f64::MAX })
  }
}

/// Fitted ARIMA(p, d, q) model with a constant.
#[derive(Debug, Clone)]
pub struct ArimaModel {
  pub order: ArimaOrder,
  pub constant: f64,
  pub exog_params: Vec<f64>,
  pub ar_params: Vec<f64>,
  pub ma_params: Vec<f64>,
  pub sigma2: f64,
  pub log_likelihood: f64,
  pub nobs: usize,
  residuals: Vec<f64>,
  levels: Vec<Vec<f64>>,
  differenced: Vec<f64>,
  has_exog: bool,
}

impl ArimaModel {
  /// Fit by conditional sum of squares.
  ///
  /// `exog` holds regressor columns aligned with `endog`; they are differenced
  /// along with the response.
  pub fn fit(endog: &[f64], exog: Option<&[Vec<f64>]>, order: ArimaOrder) -> Result<Self> {
    let min_n = order.d + order.p + order.q + 10;
    ensure_series(endog, min_n)?;
    let exog = exog.unwrap_or(&[]);
    if let Some(col) = exog.iter().find(|c| c.len() != endog.len()) {
      return Err(QuantError::DimensionMismatch(format!(
        "exogenous column has {} rows, endogenous has {}",
        col.len(),
        endog.len()
      )));
    }

    let w = difference_n(endog, order.d);
    let exog_d: Vec<Vec<f64>> = exog.iter().map(|c| difference_n(c, order.d)).collect();
    let cost = CssCost {
      w: &w,
      exog: &exog_d,
      p: order.p,
      q: order.q,
    };

    let n_params = 1 + exog.len() + order.p + order.q;
    let mut x0 = vec![0.0; n_params];
    x0[0] = mean(&w);
    let scale = std_dev(&w, 0).max(1e-8);
    let mut simplex = Vec::with_capacity(n_params + 1);
    simplex.push(x0.clone());
    for i in 0..n_params {
      let mut point = x0.clone();
      point[i] += if i == 0 { 0.1 * scale } else { 0.1 };
      simplex.push(point);
    }

    let solver = NelderMead::new(simplex)
      .with_sd_tolerance(1e-10)
      .map_err(|e| QuantError::Infeasible(format!("ARIMA{order}: {e}")))?;
    let res = Executor::new(cost, solver)
      .configure(|state| state.max_iters(4000 * n_params as u64))
      .run()
      .map_err(|e| QuantError::Infeasible(format!("ARIMA{order} failed to converge: {e}")))?;
    let params = res
      .state
      .best_param
      .ok_or_else(|| QuantError::Infeasible(format!("ARIMA{order} produced no estimate")))?;

    let cost = CssCost {
      w: &w,
      exog: &exog_d,
      p: order.p,
      q: order.q,
    };
    let residuals = cost.innovations(&params);
    let nobs = residuals.len();
    let css: f64 = residuals.iter().map(|e| e * e).sum();
    if !css.is_finite() {
      return Err(QuantError::Infeasible(format!("ARIMA{order} diverged")));
    }
    let sigma2 = css / nobs as f64;
    let log_likelihood =
      -0.5 * nobs as f64 * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
    debug!(%order, sigma2, log_likelihood, "arima fit");

    let k = exog.len();
    let levels = (0..order.d).map(|i| difference_n(endog, i)).collect();
    Ok(Self {
      order,
      constant: params[0],
      exog_params: params[1..1 + k].to_vec(),
      ar_params: params[1 + k..1 + k + order.p].to_vec(),
      ma_params: params[1 + k + order.p..].to_vec(),
      sigma2,
      log_likelihood,
      nobs,
      residuals,
      levels,
      differenced: w,
      has_exog: k > 0,
    })
  }

  /// Number of estimated parameters, including the innovation variance.
  pub fn n_params(&self) -> usize {
    2 + self.exog_params.len() + self.ar_params.len() + self.ma_params.len()
  }

  pub fn aic(&self) -> f64 {
    -2.0 * self.log_likelihood + 2.0 * self.n_params() as f64
  }

  pub fn bic(&self) -> f64 {
    -2.0 * self.log_likelihood + self.n_params() as f64 * (self.nobs as f64).ln()
  }

  pub fn hqic(&self) -> f64 {
    -2.0 * self.log_likelihood + 2.0 * self.n_params() as f64 * (self.nobs as f64).ln().ln()
  }

  pub fn info_criterion(&self, ic: InformationCriterion) -> f64 {
    match ic {
      InformationCriterion::Aic => self.aic(),
      InformationCriterion::Bic => self.bic(),
      InformationCriterion::Hqic => self.hqic(),
    }
  }

  pub fn residuals(&self) -> &[f64] {
    &self.residuals
  }

  /// Point forecasts of the original (undifferenced) series.
  pub fn forecast(&self, steps: usize) -> Result<Vec<f64>> {
    if self.has_exog {
      return Err(QuantError::InvalidParameter(
        "forecasting needs future exogenous values; refit without exog".into(),
      ));
    }

    let mut w = self.differenced.clone();
    let mut eps: Vec<f64> = vec![0.0; self.order.p];
    eps.extend_from_slice(&self.residuals);
    let n0 = w.len();

    for h in 0..steps {
      let t = n0 + h;
      let mut next = self.constant;
      for (i, ph) in self.ar_params.iter().enumerate() {
        next += ph * w[t - 1 - i];
      }
      for (j, th) in self.ma_params.iter().enumerate() {
        if t > j {
          next += th * eps[t - 1 - j];
        }
      }
      w.push(next);
      eps.push(0.0);
    }

    let mut path = w[n0..].to_vec();
    for level in self.levels.iter().rev() {
      let mut last = level.last().copied().unwrap_or(0.0);
      path = path
        .iter()
        .map(|v| {
          last += v;
          last
        })
        .collect();
    }
    Ok(path)
  }
}

/// Search ranges for [`auto_arima`], each inclusive from zero.
#[derive(Debug, Clone, Copy)]
pub struct AutoArimaConfig {
  pub max_p: usize,
  pub max_d: usize,
  pub max_q: usize,
  pub criterion: InformationCriterion,
}

impl Default for AutoArimaConfig {
  fn default() -> Self {
    Self {
      max_p: 5,
      max_d: 1,
      max_q: 5,
      criterion: InformationCriterion::Bic,
    }
  }
}

/// Grid search over `d`, then `p`, then `q`; returns the refitted best model.
///
/// A failed fit at any order aborts the search.
pub fn auto_arima(
  endog: &[f64],
  exog: Option<&[Vec<f64>]>,
  cfg: AutoArimaConfig,
) -> Result<ArimaModel> {
  let mut best: Option<(ArimaOrder, f64)> = None;

  for d in 0..=cfg.max_d {
    for p in 0..=cfg.max_p {
      for q in 0..=cfg.max_q {
        let order = ArimaOrder::new(p, d, q);
        let model = ArimaModel::fit(endog, exog, order).map_err(|e| {
          QuantError::Infeasible(format!("model failed to converge on order {order}: {e}"))
        })?;
        let score = model.info_criterion(cfg.criterion);
        if best.map_or(true, |(_, s)| score < s) {
          best = Some((order, score));
        }
      }
    }
  }

  let (order, score) = best.ok_or(QuantError::EmptyInput)?;
  info!(%order, score, criterion = ?cfg.criterion, "auto_arima selected order");
  ArimaModel::fit(endog, exog, order)
}

/// Smallest `d <= max_d` for which the ADF test rejects a unit root.
pub fn integration_order(y: &[f64], max_d: usize, cfg: AdfConfig) -> Result<usize> {
  for d in 0..=max_d {
    let w = difference_n(y, d);
    if adf_test(&w, cfg)?.reject_unit_root {
      return Ok(d);
    }
  }
  Ok(max_d)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  fn ar1(phi: f64, c: f64, n: usize, seed: u64) -> Vec<f64> {
    let dist = Normal::new(0.0, 1.0).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = vec![c / (1.0 - phi); n];
    for t in 1..n {
      x[t] = c + phi * x[t - 1] + dist.sample(&mut rng);
    }
    x
  }

  #[test]
  fn css_recovers_ar_coefficient() {
    let y = ar1(0.6, 1.0, 1500, 8);
    let m = ArimaModel::fit(&y, None, ArimaOrder::new(1, 0, 0)).unwrap();
    assert_abs_diff_eq!(m.ar_params[0], 0.6, epsilon = 0.06);
    assert_abs_diff_eq!(m.constant, 1.0, epsilon = 0.15);
    assert_abs_diff_eq!(m.sigma2, 1.0, epsilon = 0.1);
  }

  #[test]
  fn criteria_penalize_extra_parameters() {
    let y = ar1(0.5, 0.0, 400, 9);
    let m = ArimaModel::fit(&y, None, ArimaOrder::new(1, 0, 1)).unwrap();
    assert_eq!(m.n_params(), 4);
    assert!(m.bic() > m.aic());
    assert_abs_diff_eq!(m.aic(), -2.0 * m.log_likelihood + 8.0, epsilon = 1e-12);
  }

  #[test]
  fn forecast_integrates_back_to_levels() {
    // linear trend: first difference is a constant 2
    let y: Vec<f64> = (0..40).map(|t| 5.0 + 2.0 * t as f64 + 0.01 * ((t * 7) % 3) as f64).collect();
    let m = ArimaModel::fit(&y, None, ArimaOrder::new(0, 1, 0)).unwrap();
    let f = m.forecast(3).unwrap();
    assert_eq!(f.len(), 3);
    let last = *y.last().unwrap();
    assert_abs_diff_eq!(f[0], last + 2.0, epsilon = 0.05);
    assert_abs_diff_eq!(f[2], last + 6.0, epsilon = 0.15);
  }

  #[test]
  fn auto_arima_picks_a_low_order_for_ar1() {
    let y = ar1(0.7, 0.0, 300, 10);
    let cfg = AutoArimaConfig {
      max_p: 2,
      max_d: 0,
      max_q: 1,
      criterion: "bic".parse().unwrap(),
    };
    let m = auto_arima(&y, None, cfg).unwrap();
    assert!(m.order.p >= 1, "selected {}", m.order);
  }

  #[test]
  fn exogenous_regressor_is_estimated() {
    let mut rng = StdRng::seed_from_u64(12);
    let z = Normal::new(0.0, 1.0).unwrap();
    let x: Vec<f64> = (0..500).map(|_| z.sample(&mut rng)).collect();
    let y: Vec<f64> = x.iter().map(|v| 0.5 + 1.5 * v + 0.2 * z.sample(&mut rng)).collect();
    let cols = vec![x];
    let m = ArimaModel::fit(&y, Some(cols.as_slice()), ArimaOrder::new(0, 0, 0)).unwrap();
    assert_abs_diff_eq!(m.exog_params[0], 1.5, epsilon = 0.05);
    assert!(m.forecast(2).is_err());
  }

  #[test]
  fn unknown_criterion_is_rejected() {
    assert!("mse".parse::<InformationCriterion>().is_err());
  }
}
