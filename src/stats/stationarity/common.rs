use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;

use crate::error::QuantError;
use crate::error::Result;
use crate::stats::ols::OlsResult;
use crate::stats::ols::aic_from_sse;
use crate::stats::ols::bic_from_sse;
use crate::stats::ols::ols;

/// Deterministic terms of the test regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeterministicTerm {
  None,
  Constant,
  ConstantTrend,
}

impl DeterministicTerm {
  /// Number of deterministic regressors.
  pub fn n_terms(self) -> usize {
    match self {
      Self::None => 0,
      Self::Constant => 1,
      Self::ConstantTrend => 2,
    }
  }
}

/// Augmentation lag selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagSelection {
  Fixed(usize),
  Aic,
  Bic,
  TStat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalValues {
  pub one_percent: f64,
  pub five_percent: f64,
  pub ten_percent: f64,
}

impl CriticalValues {
  pub fn value_at(self, alpha: f64) -> f64 {
    if alpha <= 0.01 {
      self.one_percent
    } else if alpha <= 0.05 {
      self.five_percent
    } else {
      self.ten_percent
    }
  }
}

#[derive(Debug, Clone)]
pub struct AdfFit {
  pub statistic: f64,
  pub gamma: f64,
  pub nobs: usize,
}

pub fn difference(y: &[f64]) -> Vec<f64> {
  y.windows(2).map(|w| w[1] - w[0]).collect()
}

pub fn schwert_max_lags(n: usize) -> usize {
  if n <= 1 {
    return 0;
  }
  (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

/// Largest augmentation order for `n` levels: `n/2 - n_terms - 1`, further
/// limited so the regression keeps a residual degree of freedom. `None` when
/// the series is too short for any lag.
pub fn max_adf_lag(n: usize, det: DeterministicTerm) -> Option<usize> {
  let ntrend = det.n_terms();
  let half = (n / 2).checked_sub(ntrend + 1)?;
  // n - 1 - p rows against ntrend + 1 + p regressors
  let identified = n.checked_sub(ntrend + 3)? / 2;
  Some(half.min(identified))
}

pub fn adf_critical_values(det: DeterministicTerm) -> CriticalValues {
  match det {
    // Asymptotic MacKinnon values.
    DeterministicTerm::None => CriticalValues {
      one_percent: -2.58,
      five_percent: -1.95,
      ten_percent: -1.62,
    },
    DeterministicTerm::Constant => CriticalValues {
      one_percent: -3.43,
      five_percent: -2.86,
      ten_percent: -2.57,
    },
    DeterministicTerm::ConstantTrend => CriticalValues {
      one_percent: -3.96,
      five_percent: -3.41,
      ten_percent: -3.13,
    },
  }
}

/// MacKinnon (1994) approximate asymptotic p-value of an ADF statistic.
pub fn mackinnon_p_value(statistic: f64, det: DeterministicTerm) -> f64 {
  if !statistic.is_finite() {
    return f64::NAN;
  }

  // (tau_star, tau_min, tau_max, small-p coefficients, large-p coefficients)
  let (tau_star, tau_min, tau_max, small, large): (f64, f64, f64, [f64; 3], [f64; 4]) = match det {
    DeterministicTerm::None => (
      -1.04,
      -19.04,
      f64::INFINITY,
      [0.6344, 1.2378, 0.032496],
      [0.4797, 0.93557, -0.06999, 0.033066],
    ),
    DeterministicTerm::Constant => (
      -1.61,
      -18.83,
      2.74,
      [2.1659, 1.4412, 0.038269],
      [1.7339, 0.93202, -0.12745, -0.010368],
    ),
    DeterministicTerm::ConstantTrend => (
      -2.89,
      -16.18,
      0.7,
      [3.2512, 1.6047, 0.049588],
      [2.5261, 0.61654, -0.37956, -0.060285],
    ),
  };

  if statistic > tau_max {
    return 1.0;
  }
  if statistic < tau_min {
    return 0.0;
  }

  let poly = |coefs: &[f64]| coefs.iter().rev().fold(0.0, |acc, c| acc * statistic + c);
  let z = if statistic <= tau_star {
    poly(&small)
  } else {
    poly(&large)
  };
  let normal = Normal::new(0.0, 1.0).expect("standard normal parameters are valid");
  normal.cdf(z)
}

fn build_adf_design(
  y: &[f64],
  lags: usize,
  det: DeterministicTerm,
) -> Result<(Vec<f64>, Vec<Vec<f64>>, usize)> {
  let dy = difference(y);
  let n_dy = dy.len();
  if n_dy <= lags + 1 {
    return Err(QuantError::InsufficientData {
      needed: lags + 3,
      got: y.len(),
    });
  }

  let mut lhs = Vec::with_capacity(n_dy - lags);
  let mut rhs = Vec::with_capacity(n_dy - lags);

  for t in lags..n_dy {
    lhs.push(dy[t]);

    let mut row = Vec::with_capacity(3 + lags);
    match det {
      DeterministicTerm::None => {}
      DeterministicTerm::Constant => row.push(1.0),
      DeterministicTerm::ConstantTrend => {
        row.push(1.0);
        row.push((t + 1) as f64);
      }
    }

    // dy[t] = y[t+1] - y[t], so y[t] is the lagged level
    row.push(y[t]);

    for i in 1..=lags {
      row.push(dy[t - i]);
    }

    rhs.push(row);
  }

  let gamma_index = match det {
    DeterministicTerm::None => 0,
    DeterministicTerm::Constant => 1,
    DeterministicTerm::ConstantTrend => 2,
  };

  Ok((lhs, rhs, gamma_index))
}

pub fn fit_adf(y: &[f64], lags: usize, det: DeterministicTerm) -> Result<AdfFit> {
  let (lhs, rhs, gamma_index) = build_adf_design(y, lags, det)?;
  let fit = ols(&lhs, &rhs)?;

  let gamma = fit.beta[gamma_index];
  let se = fit.std_err[gamma_index];
  let statistic = if se > 0.0 { gamma / se } else { f64::NAN };

  Ok(AdfFit {
    statistic,
    gamma,
    nobs: fit.nobs,
  })
}

fn last_lag_tstat(fit: &OlsResult) -> f64 {
  let idx = fit.k - 1;
  let se = fit.std_err[idx];
  if se > 0.0 {
    fit.beta[idx] / se
  } else {
    0.0
  }
}

/// Choose the augmentation order.
///
/// Information criteria are compared on a common sample (the one implied by
/// `max_lags`) so the likelihoods are comparable.
pub fn choose_lag_for_adf(
  y: &[f64],
  det: DeterministicTerm,
  lag_selection: LagSelection,
  max_lags: usize,
) -> Result<usize> {
  if let LagSelection::Fixed(p) = lag_selection {
    return Ok(p);
  }

  let mut best_lag = 0usize;
  let mut best_score = f64::INFINITY;
  let mut t_stats = Vec::with_capacity(max_lags + 1);

  for lag in 0..=max_lags {
    let (lhs, rhs, _) = build_adf_design(y, lag, det)?;
    let skip = max_lags - lag;
    let fit = ols(&lhs[skip..], &rhs[skip..])?;

    let ic = match lag_selection {
      LagSelection::Aic => aic_from_sse(fit.sse, fit.nobs, fit.k),
      LagSelection::Bic => bic_from_sse(fit.sse, fit.nobs, fit.k),
      LagSelection::Fixed(_) | LagSelection::TStat => 0.0,
    };
    if ic < best_score {
      best_score = ic;
      best_lag = lag;
    }

    t_stats.push(if lag > 0 { last_lag_tstat(&fit) } else { 0.0 });
  }

  match lag_selection {
    LagSelection::Aic | LagSelection::Bic => Ok(best_lag),
    LagSelection::TStat => Ok(
      (0..=max_lags)
        .rev()
        .find(|&lag| lag == 0 || t_stats[lag].abs() >= 1.644_853_626_951_472_2)
        .unwrap_or(0),
    ),
    LagSelection::Fixed(p) => Ok(p),
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn mackinnon_matches_reference_points() {
    // MacKinnon (1994) surface at the 5% critical value
    let p = mackinnon_p_value(-2.86, DeterministicTerm::Constant);
    assert_abs_diff_eq!(p, 0.05, epsilon = 0.005);
    assert_eq!(mackinnon_p_value(-25.0, DeterministicTerm::Constant), 0.0);
    assert_eq!(mackinnon_p_value(3.0, DeterministicTerm::Constant), 1.0);
  }

  #[test]
  fn p_value_is_monotone_in_statistic() {
    let a = mackinnon_p_value(-4.0, DeterministicTerm::ConstantTrend);
    let b = mackinnon_p_value(-2.0, DeterministicTerm::ConstantTrend);
    assert!(a < b);
  }

  #[test]
  fn large_p_branch_matches_reference() {
    let p = mackinnon_p_value(-1.0, DeterministicTerm::Constant);
    assert_abs_diff_eq!(p, 0.7533, epsilon = 1e-3);
    let p = mackinnon_p_value(-2.0, DeterministicTerm::ConstantTrend);
    assert_abs_diff_eq!(p, 0.6014, epsilon = 1e-3);
  }

  #[test]
  fn p_value_is_continuous_at_switch_point() {
    for (det, tau_star) in [
      (DeterministicTerm::None, -1.04),
      (DeterministicTerm::Constant, -1.61),
      (DeterministicTerm::ConstantTrend, -2.89),
    ] {
      let below = mackinnon_p_value(tau_star - 1e-6, det);
      let above = mackinnon_p_value(tau_star + 1e-6, det);
      assert!(
        (above - below).abs() < 0.01,
        "{det:?}: jump from {below} to {above}"
      );
    }
  }

  #[test]
  fn schwert_rule() {
    assert_eq!(schwert_max_lags(100), 12);
    assert_eq!(schwert_max_lags(20), 9);
    assert_eq!(schwert_max_lags(1), 0);
  }

  #[test]
  fn lag_cap_leaves_regression_identified() {
    assert_eq!(max_adf_lag(20, DeterministicTerm::ConstantTrend), Some(7));
    assert_eq!(max_adf_lag(20, DeterministicTerm::Constant), Some(8));
    assert_eq!(max_adf_lag(20, DeterministicTerm::None), Some(8));
    assert_eq!(max_adf_lag(3, DeterministicTerm::ConstantTrend), None);
  }
}
