//! # OLS
//!
//! $$
//! \hat\beta=(X^\top X)^{-1}X^\top y,\qquad \widehat{\mathrm{Var}}(\hat\beta)=\hat\sigma^2(X^\top X)^{-1}
//! $$
//!
use nalgebra::DMatrix;
use nalgebra::DVector;

use crate::error::QuantError;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct OlsResult {
  pub beta: Vec<f64>,
  pub std_err: Vec<f64>,
  pub residuals: Vec<f64>,
  pub sse: f64,
  pub sigma2: f64,
  pub nobs: usize,
  pub k: usize,
}

/// Least squares fit of `y` on the row-major design `x`.
pub fn ols(y: &[f64], x: &[Vec<f64>]) -> Result<OlsResult> {
  if y.is_empty() {
    return Err(QuantError::EmptyInput);
  }
  if y.len() != x.len() {
    return Err(QuantError::DimensionMismatch(format!(
      "{} responses vs {} design rows",
      y.len(),
      x.len()
    )));
  }
  let n = y.len();
  let k = x[0].len();
  if k == 0 || x.iter().any(|row| row.len() != k) {
    return Err(QuantError::DimensionMismatch(
      "design matrix must be rectangular with at least one regressor".to_string(),
    ));
  }
  if n <= k {
    return Err(QuantError::InsufficientData {
      needed: k + 1,
      got: n,
    });
  }

  let x_mat = DMatrix::from_fn(n, k, |i, j| x[i][j]);
  let y_vec = DVector::from_row_slice(y);

  let xtx = x_mat.transpose() * &x_mat;
  let Some(xtx_inv) = xtx.try_inverse() else {
    return Err(QuantError::Singular("OLS design matrix".to_string()));
  };

  let beta = &xtx_inv * x_mat.transpose() * &y_vec;
  let residuals_vec = y_vec - &x_mat * &beta;

  let residuals: Vec<f64> = residuals_vec.iter().copied().collect();
  let sse = residuals.iter().map(|u| u * u).sum::<f64>();
  let sigma2 = (sse / (n - k) as f64).max(0.0);

  let std_err = (0..k)
    .map(|i| (xtx_inv[(i, i)] * sigma2).max(0.0).sqrt())
    .collect();

  Ok(OlsResult {
    beta: beta.iter().copied().collect(),
    std_err,
    residuals,
    sse,
    sigma2,
    nobs: n,
    k,
  })
}

pub fn aic_from_sse(sse: f64, nobs: usize, k: usize) -> f64 {
  let n = nobs as f64;
  n * (sse / n).ln() + 2.0 * k as f64
}

pub fn bic_from_sse(sse: f64, nobs: usize, k: usize) -> f64 {
  let n = nobs as f64;
  n * (sse / n).ln() + (k as f64) * n.ln()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn recovers_exact_line() {
    let x: Vec<Vec<f64>> = (0..10).map(|t| vec![1.0, t as f64]).collect();
    let y: Vec<f64> = (0..10).map(|t| 2.0 + 0.5 * t as f64).collect();
    let fit = ols(&y, &x).unwrap();
    assert_abs_diff_eq!(fit.beta[0], 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(fit.beta[1], 0.5, epsilon = 1e-9);
    assert!(fit.sse < 1e-18);
  }

  #[test]
  fn collinear_design_is_singular() {
    let x: Vec<Vec<f64>> = (0..6).map(|t| vec![t as f64, 2.0 * t as f64]).collect();
    let y = vec![1.0; 6];
    assert!(matches!(ols(&y, &x), Err(QuantError::Singular(_))));
  }
}
