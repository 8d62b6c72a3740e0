//! # Hurst Exponent
//!
//! $$
//! \operatorname{std}(x_{t+\tau}-x_t)\propto\tau^{H},\qquad
//! \mathbb E\big[R(n)/S(n)\big]\propto n^{H}
//! $$
//!
//! `H < 0.5` suggests mean reversion, `H ≈ 0.5` a random walk and
//! `H > 0.5` a trending series.

use std::fmt;

use linreg::linear_regression;

use super::sample::mean;
use super::sample::std_dev;
use crate::error::QuantError;
use crate::error::Result;
use crate::error::ensure_series;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HurstRegime {
  MeanReverting,
  RandomWalk,
  Trending,
}

impl HurstRegime {
  /// Classify `h` with a symmetric band of half-width `tolerance` around 0.5.
  pub fn classify(h: f64, tolerance: f64) -> Self {
    if h < 0.5 - tolerance {
      Self::MeanReverting
    } else if h > 0.5 + tolerance {
      Self::Trending
    } else {
      Self::RandomWalk
    }
  }
}

impl fmt::Display for HurstRegime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::MeanReverting => "mean reverting",
      Self::RandomWalk => "random walk",
      Self::Trending => "trending",
    };
    f.write_str(s)
  }
}

fn log_log_slope(xs: &[f64], ys: &[f64]) -> Result<f64> {
  let (slope, _intercept): (f64, f64) = linear_regression(xs, ys)
    .map_err(|e| QuantError::Singular(format!("log-log regression failed: {e:?}")))?;
  Ok(slope)
}

/// Hurst exponent from the scaling of lagged differences, lags `2..max_lag`.
pub fn hurst_exponent(x: &[f64], max_lag: usize) -> Result<f64> {
  if max_lag < 4 {
    return Err(QuantError::InvalidParameter(format!(
      "max_lag must be at least 4, got {max_lag}"
    )));
  }
  ensure_series(x, max_lag + 2)?;

  let mut log_tau = Vec::with_capacity(max_lag - 2);
  let mut log_sd = Vec::with_capacity(max_lag - 2);
  for lag in 2..max_lag {
    let diffs: Vec<f64> = x[lag..].iter().zip(x).map(|(a, b)| a - b).collect();
    let sd = std_dev(&diffs, 0);
    if sd > 0.0 {
      log_tau.push((lag as f64).ln());
      log_sd.push(sd.ln());
    }
  }
  if log_tau.len() < 2 {
    return Err(QuantError::InvalidParameter("series has no variation".into()));
  }

  log_log_slope(&log_tau, &log_sd)
}

fn rescaled_range(chunk: &[f64]) -> Option<f64> {
  let m = mean(chunk);
  let mut cum = 0.0;
  let (mut lo, mut hi) = (0.0_f64, 0.0_f64);
  for v in chunk {
    cum += v - m;
    lo = lo.min(cum);
    hi = hi.max(cum);
  }
  let s = std_dev(chunk, 0);
  (s > 0.0).then(|| (hi - lo) / s)
}

/// Classical rescaled-range estimator over doubling window sizes.
///
/// `x` is treated as an increment series (e.g. returns).
pub fn rescaled_range_hurst(x: &[f64], min_window: usize) -> Result<f64> {
  if min_window < 4 {
    return Err(QuantError::InvalidParameter(format!(
      "min_window must be at least 4, got {min_window}"
    )));
  }
  ensure_series(x, 4 * min_window)?;

  let mut log_n = Vec::new();
  let mut log_rs = Vec::new();
  let mut window = min_window;
  while window <= x.len() / 2 {
    let values: Vec<f64> = x.chunks_exact(window).filter_map(rescaled_range).collect();
    if !values.is_empty() {
      log_n.push((window as f64).ln());
      log_rs.push(mean(&values).ln());
    }
    window *= 2;
  }
  if log_n.len() < 2 {
    return Err(QuantError::InvalidParameter("series has no variation".into()));
  }

  log_log_slope(&log_n, &log_rs)
}
