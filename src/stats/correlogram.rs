//! # Correlogram
//!
//! $$
//! \hat\rho_k=\frac{\sum_{t=k}^{n-1}(x_t-\bar x)(x_{t-k}-\bar x)}{\sum_{t=0}^{n-1}(x_t-\bar x)^2},\qquad
//! Q(h)=n(n+2)\sum_{k=1}^{h}\frac{\hat\rho_k^2}{n-k}
//! $$
//!
use statrs::distribution::ChiSquared;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;

use super::sample::mean;
use crate::error::QuantError;
use crate::error::Result;
use crate::error::ensure_series;

fn check_lags(x: &[f64], nlags: usize) -> Result<()> {
  ensure_series(x, 2)?;
  if nlags >= x.len() {
    return Err(QuantError::InvalidParameter(format!(
      "nlags ({nlags}) must be smaller than the sample size ({})",
      x.len()
    )));
  }
  Ok(())
}

/// Sample autocorrelations for lags `0..=nlags` (lag 0 is 1).
pub fn acf(x: &[f64], nlags: usize) -> Result<Vec<f64>> {
  check_lags(x, nlags)?;
  let m = mean(x);
  let d: Vec<f64> = x.iter().map(|v| v - m).collect();
  let c0: f64 = d.iter().map(|v| v * v).sum();
  if c0 == 0.0 {
    return Err(QuantError::InvalidParameter("series is constant".into()));
  }

  Ok(
    (0..=nlags)
      .map(|k| d[k..].iter().zip(&d).map(|(a, b)| a * b).sum::<f64>() / c0)
      .collect(),
  )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcfPoint {
  pub lag: usize,
  pub value: f64,
  pub lower: f64,
  pub upper: f64,
}

/// Autocorrelations with Bartlett confidence intervals.
///
/// $$
/// \operatorname{Var}(\hat\rho_k)\approx\frac{1}{n}\Big(1+2\sum_{j<k}\hat\rho_j^2\Big)
/// $$
pub fn acf_with_confint(x: &[f64], nlags: usize, alpha: f64) -> Result<Vec<AcfPoint>> {
  if !(alpha > 0.0 && alpha < 1.0) {
    return Err(QuantError::InvalidParameter(format!("alpha must be in (0, 1), got {alpha}")));
  }
  let rho = acf(x, nlags)?;
  let n = x.len() as f64;
  let z = Normal::new(0.0, 1.0)
    .expect("standard normal parameters are valid")
    .inverse_cdf(1.0 - alpha / 2.0);

  let mut cum = 0.0;
  Ok(
    rho
      .iter()
      .enumerate()
      .map(|(k, &value)| {
        let half = if k == 0 {
          0.0
        } else {
          let var = if k == 1 { 1.0 / n } else { (1.0 + 2.0 * cum) / n };
          z * var.sqrt()
        };
        if k >= 1 {
          cum += value * value;
        }
        AcfPoint {
          lag: k,
          value,
          lower: value - half,
          upper: value + half,
        }
      })
      .collect(),
  )
}

/// Partial autocorrelations (Yule-Walker, Durbin-Levinson recursion).
pub fn pacf(x: &[f64], nlags: usize) -> Result<Vec<f64>> {
  let rho = acf(x, nlags)?;
  let mut out = vec![1.0];
  let mut phi_prev: Vec<f64> = Vec::new();

  for k in 1..=nlags {
    let num = rho[k] - (1..k).map(|j| phi_prev[j - 1] * rho[k - j]).sum::<f64>();
    let den = 1.0 - (1..k).map(|j| phi_prev[j - 1] * rho[j]).sum::<f64>();
    let phi_kk = if den.abs() < f64::EPSILON { 0.0 } else { num / den };

    let mut phi = Vec::with_capacity(k);
    for j in 1..k {
      phi.push(phi_prev[j - 1] - phi_kk * phi_prev[k - j - 1]);
    }
    phi.push(phi_kk);
    out.push(phi_kk);
    phi_prev = phi;
  }

  Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LjungBoxResult {
  pub lag: usize,
  pub statistic: f64,
  pub p_value: f64,
}

/// Ljung-Box portmanteau statistics for lags `1..=lags`.
pub fn ljung_box(x: &[f64], lags: usize) -> Result<Vec<LjungBoxResult>> {
  if lags == 0 {
    return Err(QuantError::InvalidParameter("lags must be at least 1".into()));
  }
  let rho = acf(x, lags)?;
  let n = x.len() as f64;

  let mut q = 0.0;
  (1..=lags)
    .map(|k| {
      q += rho[k] * rho[k] / (n - k as f64);
      let statistic = n * (n + 2.0) * q;
      let chi2 =
        ChiSquared::new(k as f64).map_err(|e| QuantError::InvalidParameter(e.to_string()))?;
      Ok(LjungBoxResult {
        lag: k,
        statistic,
        p_value: chi2.sf(statistic),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal as NormalDist;

  use super::*;

  fn ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
    let dist = NormalDist::new(0.0, 1.0).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = vec![0.0; n];
    for t in 1..n {
      x[t] = phi * x[t - 1] + dist.sample(&mut rng);
    }
    x
  }

  #[test]
  fn acf_of_short_series() {
    // mean 2.5, deviations -1.5 -0.5 0.5 1.5, c0 = 5
    let r = acf(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
    assert_abs_diff_eq!(r[0], 1.0);
    assert_abs_diff_eq!(r[1], 1.25 / 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r[2], -1.5 / 5.0, epsilon = 1e-12);
  }

  #[test]
  fn ar1_pacf_cuts_off_after_first_lag() {
    let x = ar1(0.6, 5000, 9);
    let p = pacf(&x, 5).unwrap();
    assert_abs_diff_eq!(p[1], 0.6, epsilon = 0.05);
    for v in &p[2..] {
      assert!(v.abs() < 0.06, "{p:?}");
    }
  }

  #[test]
  fn pacf_first_lag_equals_acf() {
    let x = ar1(0.3, 300, 1);
    let a = acf(&x, 3).unwrap();
    let p = pacf(&x, 3).unwrap();
    assert_abs_diff_eq!(a[1], p[1], epsilon = 1e-12);
  }

  #[test]
  fn confint_widens_with_lag() {
    let x = ar1(0.8, 400, 2);
    let pts = acf_with_confint(&x, 5, 0.05).unwrap();
    let w1 = pts[1].upper - pts[1].lower;
    let w5 = pts[5].upper - pts[5].lower;
    assert!(w5 > w1);
    assert_abs_diff_eq!(pts[1].upper - pts[1].value, 1.959964 / 20.0, epsilon = 1e-5);
  }

  #[test]
  fn ljung_box_flags_autocorrelation() {
    let x = ar1(0.7, 500, 4);
    let lb = ljung_box(&x, 10).unwrap();
    assert_eq!(lb.len(), 10);
    assert!(lb[9].p_value < 1e-6);
    assert!(lb.windows(2).all(|w| w[1].statistic >= w[0].statistic));
  }

  #[test]
  fn too_many_lags_is_an_error() {
    assert!(acf(&[1.0, 2.0, 3.0], 3).is_err());
  }
}
