//! # Errors
//!
//! Error type shared by every fallible routine in the crate.

use thiserror::Error;

/// Errors raised by statistics, models and portfolio construction.
#[derive(Debug, Error)]
pub enum QuantError {
  #[error("input series is empty")]
  EmptyInput,
  #[error("insufficient data: need at least {needed} observations, got {got}")]
  InsufficientData { needed: usize, got: usize },
  #[error("dimension mismatch: {0}")]
  DimensionMismatch(String),
  #[error("invalid parameter: {0}")]
  InvalidParameter(String),
  #[error("input contains non-finite values")]
  NonFinite,
  #[error("singular matrix: {0}")]
  Singular(String),
  #[error("optimization infeasible: {0}")]
  Infeasible(String),
  #[error("unknown method '{0}'")]
  UnknownMethod(String),
  #[error("parse error: {0}")]
  Parse(String),
  #[error("data fetch failed: {0}")]
  Fetch(String),
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, QuantError>;

/// Fails unless `xs` holds at least `min_n` finite observations.
pub(crate) fn ensure_series(xs: &[f64], min_n: usize) -> Result<()> {
  if xs.is_empty() {
    return Err(QuantError::EmptyInput);
  }
  if xs.len() < min_n {
    return Err(QuantError::InsufficientData {
      needed: min_n,
      got: xs.len(),
    });
  }
  if !xs.iter().all(|v| v.is_finite()) {
    return Err(QuantError::NonFinite);
  }
  Ok(())
}
