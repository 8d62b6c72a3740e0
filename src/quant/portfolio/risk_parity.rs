//! # Risk Parity
//!
//! $$
//! RC_i=\frac{w_i(\Sigma w)_i}{w^\top\Sigma w},\qquad
//! \min_{w}\ \sum_i (RC_i-b_i)^2\quad\text{s.t.}\ \mathbf 1^\top w=1,\ l\le w\le u
//! $$
//!
//! Risk budgeting by penalized least squares. Weights live on the simplex via
//! a softmax parametrisation; box bounds enter as a quadratic penalty.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use nalgebra::DMatrix;
use nalgebra::DVector;
use tracing::debug;

use super::efficient_frontier::WeightBounds;
use crate::error::QuantError;
use crate::error::Result;

const BOUND_PENALTY: f64 = 1e4;

fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if sum < 1e-15 {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

fn check_covariance(cov: &DMatrix<f64>) -> Result<usize> {
  let n = cov.nrows();
  if n == 0 {
    return Err(QuantError::EmptyInput);
  }
  if cov.ncols() != n {
    return Err(QuantError::DimensionMismatch(format!(
      "covariance must be square, got {}x{}",
      n,
      cov.ncols()
    )));
  }
  if cov.iter().any(|v| !v.is_finite()) {
    return Err(QuantError::NonFinite);
  }
  Ok(n)
}

/// Share of portfolio variance contributed by each asset; sums to one.
pub fn risk_contribution(weights: &[f64], cov: &DMatrix<f64>) -> Result<Vec<f64>> {
  let n = check_covariance(cov)?;
  if weights.len() != n {
    return Err(QuantError::DimensionMismatch(format!(
      "{} weights for a {n}x{n} covariance",
      weights.len()
    )));
  }
  let w = DVector::from_column_slice(weights);
  let sigma_w = cov * &w;
  let variance = w.dot(&sigma_w);
  if variance <= 0.0 {
    return Err(QuantError::InvalidParameter("portfolio variance is zero".into()));
  }
  Ok(w.component_mul(&sigma_w).iter().map(|c| c / variance).collect())
}

struct RiskBudgetCost {
  cov: DMatrix<f64>,
  target: Vec<f64>,
  bounds: Vec<(f64, f64)>,
}

impl CostFunction for RiskBudgetCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let w = DVector::from_vec(softmax(x));
    let sigma_w = &self.cov * &w;
    let port_var = w.dot(&sigma_w);
    if port_var < 1e-30 {
      return Ok(1e10);
    }

    let mut err = 0.0;
    for i in 0..w.len() {
      let rc_i = w[i] * sigma_w[i] / port_var;
      err += (rc_i - self.target[i]).powi(2);

      let (lo, hi) = self.bounds[i];
      err += BOUND_PENALTY * ((lo - w[i]).max(0.0).powi(2) + (w[i] - hi).max(0.0).powi(2));
    }
    Ok(err)
  }
}

/// Long-only weights whose risk contributions best match `target`.
pub fn target_risk_contribution(
  target: &[f64],
  cov: &DMatrix<f64>,
  bounds: &WeightBounds,
) -> Result<Vec<f64>> {
  let n = check_covariance(cov)?;
  if target.len() != n {
    return Err(QuantError::DimensionMismatch(format!(
      "{} risk targets for {n} assets",
      target.len()
    )));
  }
  if target.iter().any(|b| *b < 0.0) || (target.iter().sum::<f64>() - 1.0).abs() > 1e-8 {
    return Err(QuantError::InvalidParameter(
      "risk targets must be non-negative and sum to one".into(),
    ));
  }
  let bounds = bounds.resolve(n)?;
  if bounds.iter().any(|(lo, _)| *lo < 0.0) {
    return Err(QuantError::InvalidParameter(
      "risk budgeting requires non-negative lower bounds".into(),
    ));
  }
  if n == 1 {
    return Ok(vec![1.0]);
  }

  // start from inverse-volatility weights
  let x0: Vec<f64> = (0..n)
    .map(|i| -0.5 * cov[(i, i)].max(1e-300).ln())
    .collect();
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.clone());
  for i in 0..n {
    let mut point = x0.clone();
    point[i] += 1.0;
    simplex.push(point);
  }

  let cost = RiskBudgetCost {
    cov: cov.clone(),
    target: target.to_vec(),
    bounds,
  };
  let solver = NelderMead::new(simplex)
    .with_sd_tolerance(1e-14)
    .map_err(|e| QuantError::Infeasible(e.to_string()))?;
  let res = Executor::new(cost, solver)
    .configure(|state| state.max_iters(20_000))
    .run()
    .map_err(|e| QuantError::Infeasible(format!("risk budgeting failed: {e}")))?;

  debug!(
    cost = res.state.best_cost,
    iterations = res.state.iter,
    "risk budgeting"
  );
  let best_x = res.state.best_param.unwrap_or(x0);
  Ok(softmax(&best_x))
}

/// Equal risk contribution portfolio.
pub fn risk_parity_portfolio(cov: &DMatrix<f64>, bounds: &WeightBounds) -> Result<Vec<f64>> {
  let n = check_covariance(cov)?;
  target_risk_contribution(&vec![1.0 / n as f64; n], cov, bounds)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn contributions_sum_to_one() {
    let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09]);
    let rc = risk_contribution(&[0.5, 0.5], &cov).unwrap();
    assert_abs_diff_eq!(rc.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    // (0.5*0.025) / 0.0375 and (0.5*0.05) / 0.0375
    assert_abs_diff_eq!(rc[0], 1.0 / 3.0, epsilon = 1e-12);
  }

  #[test]
  fn uncorrelated_parity_is_inverse_volatility() {
    let cov = DMatrix::from_diagonal(&DVector::from_vec(vec![0.04, 0.09, 0.16]));
    let w = risk_parity_portfolio(&cov, &WeightBounds::default()).unwrap();
    let inv: Vec<f64> = [0.2, 0.3, 0.4].iter().map(|s| 1.0 / s).collect();
    let total: f64 = inv.iter().sum();
    for i in 0..3 {
      assert_abs_diff_eq!(w[i], inv[i] / total, epsilon = 1e-4);
    }
  }

  #[test]
  fn correlated_parity_equalises_contributions() {
    let cov = DMatrix::from_row_slice(
      3,
      3,
      &[0.04, 0.006, 0.004, 0.006, 0.09, 0.018, 0.004, 0.018, 0.16],
    );
    let w = risk_parity_portfolio(&cov, &WeightBounds::default()).unwrap();
    assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    for rc in risk_contribution(&w, &cov).unwrap() {
      assert_abs_diff_eq!(rc, 1.0 / 3.0, epsilon = 1e-4);
    }
  }

  #[test]
  fn custom_budget_is_matched() {
    let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.09]);
    let w = target_risk_contribution(&[0.7, 0.3], &cov, &WeightBounds::default()).unwrap();
    let rc = risk_contribution(&w, &cov).unwrap();
    assert_abs_diff_eq!(rc[0], 0.7, epsilon = 1e-4);
  }

  #[test]
  fn rejects_bad_targets() {
    let cov = DMatrix::identity(2, 2);
    assert!(target_risk_contribution(&[0.7, 0.7], &cov, &WeightBounds::default()).is_err());
    assert!(target_risk_contribution(&[0.5, 0.5], &cov, &WeightBounds::Uniform(-1.0, 1.0)).is_err());
  }
}
