//! Sample moments and quantiles shared by the statistics modules.

pub fn mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().sum::<f64>() / xs.len() as f64
  }
}

/// Variance with `ddof` delta degrees of freedom (`NaN` when undefined).
pub fn variance(xs: &[f64], ddof: usize) -> f64 {
  if xs.len() <= ddof {
    return f64::NAN;
  }
  let m = mean(xs);
  xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - ddof) as f64
}

pub fn std_dev(xs: &[f64], ddof: usize) -> f64 {
  variance(xs, ddof).sqrt()
}

pub fn covariance(x: &[f64], y: &[f64], ddof: usize) -> f64 {
  let n = x.len().min(y.len());
  if n <= ddof {
    return f64::NAN;
  }
  let mx = mean(&x[..n]);
  let my = mean(&y[..n]);
  (0..n).map(|i| (x[i] - mx) * (y[i] - my)).sum::<f64>() / (n - ddof) as f64
}

/// Percentile `q` in `[0, 100]` with linear interpolation between order statistics.
pub fn percentile(xs: &[f64], q: f64) -> f64 {
  if xs.is_empty() {
    return f64::NAN;
  }
  let mut sorted = xs.to_vec();
  sorted.sort_by(f64::total_cmp);

  let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  let frac = pos - lo as f64;
  sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
