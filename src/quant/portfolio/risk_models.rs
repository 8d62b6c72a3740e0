//! # Risk Models
//!
//! $$
//! \hat\Sigma_{LW}=(1-\delta)\,S+\delta\,\frac{\operatorname{tr}S}{p}\,I,\qquad
//! \Sigma_{ij} = \sigma_i \sigma_j \rho_{ij}
//! $$
//!
//! Sample and Ledoit-Wolf shrunk covariance of asset returns, annualised by
//! `frequency`.

use nalgebra::DMatrix;
use tracing::debug;

use crate::data::frame::PriceFrame;
use crate::error::QuantError;
use crate::error::Result;

fn centered_returns(prices: &PriceFrame) -> Result<DMatrix<f64>> {
  if prices.n_assets() == 0 {
    return Err(QuantError::EmptyInput);
  }
  let x = prices.returns_matrix();
  if x.nrows() < 2 {
    return Err(QuantError::InsufficientData {
      needed: 3,
      got: prices.len(),
    });
  }
  if x.iter().any(|v| !v.is_finite()) {
    return Err(QuantError::NonFinite);
  }
  let mut x = x;
  for mut col in x.column_iter_mut() {
    let m = col.mean();
    col.add_scalar_mut(-m);
  }
  Ok(x)
}

/// Annualised sample covariance (`ddof = 1`).
pub fn sample_covariance(prices: &PriceFrame, frequency: f64) -> Result<DMatrix<f64>> {
  let x = centered_returns(prices)?;
  let n = x.nrows() as f64;
  Ok(x.transpose() * &x * (frequency / (n - 1.0)))
}

/// Shrunk covariance with its shrinkage intensity.
#[derive(Debug, Clone)]
pub struct ShrunkCovariance {
  pub matrix: DMatrix<f64>,
  pub shrinkage: f64,
}

/// Ledoit-Wolf shrinkage towards a scaled identity.
pub fn ledoit_wolf(prices: &PriceFrame, frequency: f64) -> Result<ShrunkCovariance> {
  let x = centered_returns(prices)?;
  let n = x.nrows() as f64;
  let p = x.ncols();

  let emp_cov = x.transpose() * &x / n;
  let mu = emp_cov.trace() / p as f64;

  if p == 1 {
    return Ok(ShrunkCovariance {
      matrix: emp_cov * frequency,
      shrinkage: 0.0,
    });
  }

  let x2 = x.map(|v| v * v);
  let beta_ = (x2.transpose() * &x2).sum();
  let delta_ = (x.transpose() * &x).map(|v| v * v).sum() / (n * n);

  let mut beta = (beta_ / n - delta_) / (p as f64 * n);
  let delta = (delta_ - 2.0 * mu * emp_cov.trace() + p as f64 * mu * mu) / p as f64;
  beta = beta.min(delta);
  let shrinkage = if beta == 0.0 { 0.0 } else { beta / delta };
  debug!(shrinkage, "ledoit-wolf");

  let target = DMatrix::<f64>::identity(p, p) * mu;
  let shrunk = emp_cov * (1.0 - shrinkage) + target * shrinkage;
  Ok(ShrunkCovariance {
    matrix: shrunk * frequency,
    shrinkage,
  })
}

/// Correlation matrix implied by a covariance matrix.
pub fn correlation_from_covariance(cov: &DMatrix<f64>) -> DMatrix<f64> {
  let n = cov.nrows();
  let sd: Vec<f64> = (0..n).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();

  DMatrix::from_fn(n, n, |i, j| {
    let denom = sd[i] * sd[j];
    if i == j {
      1.0
    } else if denom > 1e-15 {
      (cov[(i, j)] / denom).clamp(-1.0, 1.0)
    } else {
      0.0
    }
  })
}
