//! # Regression
//!
//! $$
//! \min_\beta\ \frac{1}{2n}\lVert y-X\beta\rVert^2
//! +\alpha\Big(\frac{1-\ell_1}{2}\lVert\beta\rVert_2^2+\ell_1\lVert\beta\rVert_1\Big)
//! $$
//!
//! OLS, ridge (`ℓ₁ = 0`) and lasso (`ℓ₁ = 1`) on a design with an added
//! constant. Lasso refits OLS on the selected support.

use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;
use nalgebra::DVector;
use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::StudentsT;
use tracing::debug;

use crate::error::QuantError;
use crate::error::Result;
use crate::stats::ols::ols;
use crate::stats::sample::mean;

/// Penalty weight used by [`regress`] for the regularized methods.
pub const DEFAULT_PENALTY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressionMethod {
  Ols,
  Ridge,
  Lasso,
}

impl FromStr for RegressionMethod {
  type Err = QuantError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "ols" => Ok(Self::Ols),
      "ridge" => Ok(Self::Ridge),
      "lasso" => Ok(Self::Lasso),
      _ => Err(QuantError::UnknownMethod(format!(
        "{s} (choose from 'OLS', 'Ridge', or 'Lasso')"
      ))),
    }
  }
}

impl fmt::Display for RegressionMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Ols => "OLS",
      Self::Ridge => "Ridge",
      Self::Lasso => "Lasso",
    };
    f.write_str(s)
  }
}

/// Fitted regression. `params[0]` is the constant.
#[derive(Debug, Clone)]
pub struct RegressionResult {
  pub method: RegressionMethod,
  pub params: Vec<f64>,
  /// Standard errors; absent for ridge fits.
  pub std_err: Option<Vec<f64>>,
  pub t_values: Option<Vec<f64>>,
  pub p_values: Option<Vec<f64>>,
  pub r_squared: f64,
  pub adj_r_squared: f64,
  pub residuals: Vec<f64>,
  pub nobs: usize,
}

impl RegressionResult {
  /// Coefficient table. Only available for OLS fits.
  pub fn summary(&self) -> Result<Table> {
    if self.method != RegressionMethod::Ols {
      return Err(QuantError::InvalidParameter(format!(
        "summary is only available for OLS, not {}",
        self.method
      )));
    }
    let (Some(se), Some(t), Some(p)) = (&self.std_err, &self.t_values, &self.p_values) else {
      return Err(QuantError::InvalidParameter("missing inference statistics".into()));
    };

    let mut table = Table::new();
    table.set_titles(Row::new(vec![
      Cell::new(""),
      Cell::new("coef"),
      Cell::new("std err"),
      Cell::new("t"),
      Cell::new("P>|t|"),
    ]));
    for i in 0..self.params.len() {
      let name = if i == 0 {
        "const".to_string()
      } else {
        format!("x{i}")
      };
      table.add_row(Row::new(vec![
        Cell::new(&name),
        Cell::new(&format!("{:.4}", self.params[i])),
        Cell::new(&format!("{:.4}", se[i])),
        Cell::new(&format!("{:.3}", t[i])),
        Cell::new(&format!("{:.3}", p[i])),
      ]));
    }
    table.add_row(Row::new(vec![
      Cell::new("R-squared"),
      Cell::new(&format!("{:.4}", self.r_squared)),
      Cell::new("Adj. R-squared"),
      Cell::new(&format!("{:.4}", self.adj_r_squared)),
      Cell::new(&format!("n = {}", self.nobs)),
    ]));
    Ok(table)
  }
}

fn design_with_constant(y: &[f64], x_columns: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
  if y.is_empty() {
    return Err(QuantError::EmptyInput);
  }
  if let Some(c) = x_columns.iter().find(|c| c.len() != y.len()) {
    return Err(QuantError::DimensionMismatch(format!(
      "regressor has {} rows, response has {}",
      c.len(),
      y.len()
    )));
  }
  Ok(
    (0..y.len())
      .map(|i| {
        std::iter::once(1.0)
          .chain(x_columns.iter().map(|c| c[i]))
          .collect()
      })
      .collect(),
  )
}

fn fit_quality(y: &[f64], residuals: &[f64], k: usize) -> (f64, f64) {
  let n = y.len() as f64;
  let m = mean(y);
  let tss: f64 = y.iter().map(|v| (v - m).powi(2)).sum();
  let sse: f64 = residuals.iter().map(|e| e * e).sum();
  let r2 = if tss > 0.0 { 1.0 - sse / tss } else { f64::NAN };
  let adj = 1.0 - (1.0 - r2) * (n - 1.0) / (n - k as f64);
  (r2, adj)
}

fn inference(params: &[f64], std_err: &[f64], df: usize) -> Result<(Vec<f64>, Vec<f64>)> {
  let dist = StudentsT::new(0.0, 1.0, df as f64)
    .map_err(|e| QuantError::InvalidParameter(e.to_string()))?;
  let t: Vec<f64> = params
    .iter()
    .zip(std_err)
    .map(|(b, s)| if *s > 0.0 { b / s } else { f64::NAN })
    .collect();
  let p = t.iter().map(|t| 2.0 * dist.sf(t.abs())).collect();
  Ok((t, p))
}

fn residuals_of(y: &[f64], design: &[Vec<f64>], params: &[f64]) -> Vec<f64> {
  y.iter()
    .zip(design)
    .map(|(yi, row)| yi - row.iter().zip(params).map(|(x, b)| x * b).sum::<f64>())
    .collect()
}

/// Regression of `y` on the columns `x_columns` plus a constant.
pub fn regress(y: &[f64], x_columns: &[Vec<f64>], method: RegressionMethod) -> Result<RegressionResult> {
  regress_penalized(y, x_columns, method, DEFAULT_PENALTY)
}

/// As [`regress`] with an explicit penalty weight for ridge and lasso.
pub fn regress_penalized(
  y: &[f64],
  x_columns: &[Vec<f64>],
  method: RegressionMethod,
  alpha: f64,
) -> Result<RegressionResult> {
  if alpha < 0.0 {
    return Err(QuantError::InvalidParameter(format!("alpha must be non-negative, got {alpha}")));
  }
  let design = design_with_constant(y, x_columns)?;
  let k = design[0].len();

  match method {
    RegressionMethod::Ols => {
      let fit = ols(y, &design)?;
      let (t, p) = inference(&fit.beta, &fit.std_err, fit.nobs - fit.k)?;
      let (r2, adj) = fit_quality(y, &fit.residuals, k);
      Ok(RegressionResult {
        method,
        params: fit.beta,
        std_err: Some(fit.std_err),
        t_values: Some(t),
        p_values: Some(p),
        r_squared: r2,
        adj_r_squared: adj,
        residuals: fit.residuals,
        nobs: fit.nobs,
      })
    }
    RegressionMethod::Ridge => {
      let params = ridge(y, &design, alpha)?;
      let residuals = residuals_of(y, &design, &params);
      let (r2, adj) = fit_quality(y, &residuals, k);
      Ok(RegressionResult {
        method,
        params,
        std_err: None,
        t_values: None,
        p_values: None,
        r_squared: r2,
        adj_r_squared: adj,
        residuals,
        nobs: y.len(),
      })
    }
    RegressionMethod::Lasso => {
      let raw = lasso_coordinate_descent(y, &design, alpha, 10_000, 1e-10);
      let support: Vec<usize> = (0..k).filter(|&j| raw[j] != 0.0).collect();
      debug!(?support, "lasso support");

      let mut params = vec![0.0; k];
      let mut std_err = vec![0.0; k];
      let mut t_values = vec![f64::NAN; k];
      let mut p_values = vec![f64::NAN; k];

      if !support.is_empty() {
        let reduced: Vec<Vec<f64>> = design
          .iter()
          .map(|row| support.iter().map(|&j| row[j]).collect())
          .collect();
        let fit = ols(y, &reduced)?;
        let (t, p) = inference(&fit.beta, &fit.std_err, fit.nobs - fit.k)?;
        for (pos, &j) in support.iter().enumerate() {
          params[j] = fit.beta[pos];
          std_err[j] = fit.std_err[pos];
          t_values[j] = t[pos];
          p_values[j] = p[pos];
        }
      }

      let residuals = residuals_of(y, &design, &params);
      let (r2, adj) = fit_quality(y, &residuals, support.len().max(1));
      Ok(RegressionResult {
        method,
        params,
        std_err: Some(std_err),
        t_values: Some(t_values),
        p_values: Some(p_values),
        r_squared: r2,
        adj_r_squared: adj,
        residuals,
        nobs: y.len(),
      })
    }
  }
}

/// Closed-form ridge: `(XᵀX + αnI)⁻¹Xᵀy`.
fn ridge(y: &[f64], design: &[Vec<f64>], alpha: f64) -> Result<Vec<f64>> {
  let n = design.len();
  let k = design[0].len();
  let x = DMatrix::from_fn(n, k, |i, j| design[i][j]);
  let yv = DVector::from_row_slice(y);
  let lhs = x.transpose() * &x + DMatrix::identity(k, k) * (alpha * n as f64);
  let rhs = x.transpose() * yv;
  let chol = lhs
    .cholesky()
    .ok_or_else(|| QuantError::Singular("ridge normal equations".into()))?;
  Ok(chol.solve(&rhs).iter().copied().collect())
}

fn soft_threshold(z: f64, gamma: f64) -> f64 {
  if z > gamma {
    z - gamma
  } else if z < -gamma {
    z + gamma
  } else {
    0.0
  }
}

fn lasso_coordinate_descent(
  y: &[f64],
  design: &[Vec<f64>],
  alpha: f64,
  max_iter: usize,
  tol: f64,
) -> Vec<f64> {
  let n = design.len() as f64;
  let k = design[0].len();
  let mut beta = vec![0.0; k];
  let mut resid = y.to_vec();
  let col_sq: Vec<f64> = (0..k)
    .map(|j| design.iter().map(|r| r[j] * r[j]).sum::<f64>() / n)
    .collect();

  for _ in 0..max_iter {
    let mut max_step = 0.0_f64;
    for j in 0..k {
      if col_sq[j] == 0.0 {
        continue;
      }
      let rho = design
        .iter()
        .zip(&resid)
        .map(|(row, r)| row[j] * (r + row[j] * beta[j]))
        .sum::<f64>()
        / n;
      let updated = soft_threshold(rho, alpha) / col_sq[j];
      let step = updated - beta[j];
      if step != 0.0 {
        for (row, r) in design.iter().zip(resid.iter_mut()) {
          *r -= row[j] * step;
        }
        beta[j] = updated;
      }
      max_step = max_step.max(step.abs());
    }
    if max_step < tol {
      break;
    }
  }
  beta
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  fn data(n: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, 0.1).unwrap();
    let z = Normal::new(0.0, 1.0).unwrap();
    let x1: Vec<f64> = (0..n).map(|t| t as f64 / 10.0).collect();
    let x2: Vec<f64> = (0..n).map(|_| z.sample(&mut rng)).collect();
    let y = x1.iter().map(|v| 3.0 + 2.0 * v + noise.sample(&mut rng)).collect();
    (y, vec![x1, x2])
  }

  #[test]
  fn method_names_parse() {
    assert_eq!("OLS".parse::<RegressionMethod>().unwrap(), RegressionMethod::Ols);
    assert_eq!("lasso".parse::<RegressionMethod>().unwrap(), RegressionMethod::Lasso);
    assert!(matches!(
      "elastic".parse::<RegressionMethod>(),
      Err(QuantError::UnknownMethod(_))
    ));
  }

  #[test]
  fn ols_recovers_coefficients() {
    let (y, x) = data(200);
    let res = regress(&y, &x, RegressionMethod::Ols).unwrap();
    assert_abs_diff_eq!(res.params[0], 3.0, epsilon = 0.05);
    assert_abs_diff_eq!(res.params[1], 2.0, epsilon = 0.01);
    assert!(res.r_squared > 0.99);
    let p = res.p_values.as_ref().unwrap();
    assert!(p[1] < 1e-10);
    assert!(res.summary().is_ok());
  }

  #[test]
  fn lasso_drops_irrelevant_regressor_and_refits() {
    let (y, x) = data(200);
    let res = regress(&y, &x, RegressionMethod::Lasso).unwrap();
    assert_eq!(res.params[2], 0.0);
    assert!(res.params[1] > 1.5);
    // the refit is least squares on the support: residuals orthogonal to it
    let design = design_with_constant(&y, &x).unwrap();
    for j in (0..3).filter(|&j| res.params[j] != 0.0) {
      let dot: f64 = design.iter().zip(&res.residuals).map(|(r, e)| r[j] * e).sum();
      assert_abs_diff_eq!(dot, 0.0, epsilon = 1e-6);
    }
  }

  #[test]
  fn ridge_shrinks_towards_zero() {
    let (y, x) = data(200);
    let ols_fit = regress(&y, &x, RegressionMethod::Ols).unwrap();
    let ridge_fit = regress(&y, &x, RegressionMethod::Ridge).unwrap();
    let norm = |p: &[f64]| p.iter().map(|v| v * v).sum::<f64>();
    assert!(norm(&ridge_fit.params) < norm(&ols_fit.params));
    assert!(ridge_fit.std_err.is_none());
    assert!(matches!(ridge_fit.summary(), Err(QuantError::InvalidParameter(_))));
  }

  #[test]
  fn ragged_regressor_is_rejected() {
    let err = regress(&[1.0, 2.0, 3.0], &[vec![1.0, 2.0]], RegressionMethod::Ols).unwrap_err();
    assert!(matches!(err, QuantError::DimensionMismatch(_)));
  }
}
