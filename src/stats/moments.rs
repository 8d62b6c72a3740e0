//! # Moments
//!
//! $$
//! g_1=\frac{m_3}{m_2^{3/2}},\qquad g_2=\frac{m_4}{m_2^2}-3,\qquad
//! DD_t=\frac{P_t}{\max_{s\le t}P_s}-1
//! $$
//!
//! Higher moments with D'Agostino / Jarque-Bera tests, drawdowns,
//! cumulative returns, stability and CAPM alpha/beta.

use statrs::distribution::ChiSquared;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;
use tracing::warn;

use super::sample::mean;
use crate::data::returns::cumulative_from_returns;
use crate::data::returns::pct_change;
use crate::error::QuantError;
use crate::error::Result;
use crate::error::ensure_series;

/// Statistic and two-sided p-value of a hypothesis test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
  pub statistic: f64,
  pub p_value: f64,
}

fn central_moments(x: &[f64]) -> (f64, f64, f64) {
  let n = x.len() as f64;
  let m = mean(x);
  let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
  for &v in x {
    let d = v - m;
    let d2 = d * d;
    m2 += d2;
    m3 += d2 * d;
    m4 += d2 * d2;
  }
  (m2 / n, m3 / n, m4 / n)
}

fn std_normal() -> Normal {
  Normal::new(0.0, 1.0).expect("standard normal parameters are valid")
}

/// Biased sample skewness. `NaN` for a constant sample.
pub fn skewness(x: &[f64]) -> Result<f64> {
  ensure_series(x, 1)?;
  let (m2, m3, _) = central_moments(x);
  if m2 <= 0.0 {
    return Ok(f64::NAN);
  }
  Ok(m3 / m2.powf(1.5))
}

/// Biased excess kurtosis (Fisher definition). `NaN` for a constant sample.
pub fn kurtosis(x: &[f64]) -> Result<f64> {
  ensure_series(x, 1)?;
  let (m2, _, m4) = central_moments(x);
  if m2 <= 0.0 {
    return Ok(f64::NAN);
  }
  Ok(m4 / (m2 * m2) - 3.0)
}

/// D'Agostino test that the skewness equals that of a normal distribution.
pub fn skew_test(x: &[f64]) -> Result<TestResult> {
  ensure_series(x, 8)?;
  let b2 = skewness(x)?;
  let n = x.len() as f64;

  let mut y = b2 * (((n + 1.0) * (n + 3.0)) / (6.0 * (n - 2.0))).sqrt();
  let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
    / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
  let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
  let delta = 1.0 / (0.5 * w2.ln()).sqrt();
  let alpha = (2.0 / (w2 - 1.0)).sqrt();
  if y == 0.0 {
    y = 1.0;
  }
  let z = delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln();
  let p_value = 2.0 * (1.0 - std_normal().cdf(z.abs()));

  Ok(TestResult {
    statistic: z,
    p_value,
  })
}

/// Anscombe-Glynn test that the kurtosis equals that of a normal distribution.
pub fn kurtosis_test(x: &[f64]) -> Result<TestResult> {
  ensure_series(x, 5)?;
  let n = x.len() as f64;
  if x.len() < 20 {
    warn!(n = x.len(), "kurtosis test is only valid for n >= 20");
  }

  let b2 = kurtosis(x)? + 3.0;
  let e = 3.0 * (n - 1.0) / (n + 1.0);
  let varb2 =
    24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
  let xs = (b2 - e) / varb2.sqrt();
  let sqrtbeta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
    * ((6.0 * (n + 3.0) * (n + 5.0)) / (n * (n - 2.0) * (n - 3.0))).sqrt();
  let a = 6.0
    + 8.0 / sqrtbeta1 * (2.0 / sqrtbeta1 + (1.0 + 4.0 / (sqrtbeta1 * sqrtbeta1)).sqrt());
  let term1 = 1.0 - 2.0 / (9.0 * a);
  let denom = 1.0 + xs * (2.0 / (a - 4.0)).sqrt();
  let term2 = if denom == 0.0 {
    f64::NAN
  } else {
    denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).powf(1.0 / 3.0)
  };
  let z = (term1 - term2) / (2.0 / (9.0 * a)).sqrt();
  let p_value = 2.0 * (1.0 - std_normal().cdf(z.abs()));

  Ok(TestResult {
    statistic: z,
    p_value,
  })
}

/// Jarque-Bera normality test with chi-square(2) p-value.
pub fn jarque_bera(x: &[f64]) -> Result<TestResult> {
  ensure_series(x, 8)?;
  let n = x.len() as f64;
  let s = skewness(x)?;
  let k = kurtosis(x)?;
  if !s.is_finite() || !k.is_finite() {
    return Ok(TestResult {
      statistic: f64::INFINITY,
      p_value: 0.0,
    });
  }

  let statistic = (n / 6.0) * (s * s + 0.25 * k * k);
  let chi2 = ChiSquared::new(2.0).expect("chi-square df=2 must be valid");
  Ok(TestResult {
    statistic,
    p_value: (1.0 - chi2.cdf(statistic)).clamp(0.0, 1.0),
  })
}

fn ensure_prices(prices: &[f64], min_n: usize) -> Result<()> {
  ensure_series(prices, min_n)?;
  if prices.iter().any(|p| *p <= 0.0) {
    return Err(QuantError::InvalidParameter(
      "prices must be strictly positive".to_string(),
    ));
  }
  Ok(())
}

/// Drawdown path `P_t / cummax(P)_t - 1`.
pub fn drawdown_series(prices: &[f64]) -> Result<Vec<f64>> {
  ensure_prices(prices, 1)?;
  let mut peak = f64::NEG_INFINITY;
  Ok(
    prices
      .iter()
      .map(|&p| {
        peak = peak.max(p);
        p / peak - 1.0
      })
      .collect(),
  )
}

/// Deepest drawdown (a non-positive number).
pub fn maximum_drawdown(prices: &[f64]) -> Result<f64> {
  Ok(drawdown_series(prices)?.into_iter().fold(0.0, f64::min))
}

/// Compounded return path `cumprod(1 + r) - 1`.
pub fn cumulative_returns(prices: &[f64]) -> Result<Vec<f64>> {
  ensure_prices(prices, 2)?;
  Ok(cumulative_from_returns(&pct_change(prices)))
}

/// R-squared of a linear fit of cumulative log returns on time.
pub fn stability_of_timeseries(prices: &[f64]) -> Result<f64> {
  ensure_prices(prices, 3)?;
  let mut acc = 0.0;
  let cum: Vec<f64> = pct_change(prices)
    .into_iter()
    .map(|r| {
      acc += r.ln_1p();
      acc
    })
    .collect();

  let t: Vec<f64> = (0..cum.len()).map(|i| i as f64).collect();
  let mt = mean(&t);
  let mc = mean(&cum);
  let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
  for (x, y) in t.iter().zip(cum.iter()) {
    sxy += (x - mt) * (y - mc);
    sxx += (x - mt).powi(2);
    syy += (y - mc).powi(2);
  }
  if sxx <= 0.0 || syy <= 0.0 {
    return Ok(f64::NAN);
  }
  let r = sxy / (sxx * syy).sqrt();
  Ok(r * r)
}

/// CAPM regression coefficients against a benchmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaBeta {
  /// Annualised Jensen's alpha.
  pub alpha: f64,
  pub beta: f64,
}

/// Annualised alpha and beta of `prices` against per-period `benchmark_returns`.
///
/// `risk_free` is a per-period rate subtracted from both legs.
pub fn alpha_beta(
  prices: &[f64],
  benchmark_returns: &[f64],
  risk_free: f64,
  periods_per_year: f64,
) -> Result<AlphaBeta> {
  ensure_prices(prices, 3)?;
  let returns = pct_change(prices);
  if returns.len() != benchmark_returns.len() {
    return Err(QuantError::DimensionMismatch(format!(
      "{} asset returns vs {} benchmark returns",
      returns.len(),
      benchmark_returns.len()
    )));
  }
  ensure_series(benchmark_returns, 2)?;

  let excess: Vec<f64> = returns.iter().map(|r| r - risk_free).collect();
  let bench: Vec<f64> = benchmark_returns.iter().map(|b| b - risk_free).collect();

  let mb = mean(&bench);
  let resid: Vec<f64> = bench.iter().map(|b| b - mb).collect();
  let cov = mean(&resid.iter().zip(excess.iter()).map(|(a, b)| a * b).collect::<Vec<_>>());
  let var = mean(&resid.iter().map(|a| a * a).collect::<Vec<_>>());
  let beta = if var > 0.0 { cov / var } else { f64::NAN };

  let alpha_series: Vec<f64> = excess
    .iter()
    .zip(bench.iter())
    .map(|(r, b)| r - beta * b)
    .collect();
  let alpha = (mean(&alpha_series) + 1.0).powf(periods_per_year) - 1.0;

  Ok(AlphaBeta { alpha, beta })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;
  use tracing_test::traced_test;

  use super::*;

  fn normal_sample(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(0.0, 1.0).unwrap();
    (0..n).map(|_| dist.sample(&mut rng)).collect()
  }

  #[test]
  fn skewness_of_symmetric_sample_is_zero() {
    let x = [-2.0, -1.0, 0.0, 1.0, 2.0];
    assert_abs_diff_eq!(skewness(&x).unwrap(), 0.0, epsilon = 1e-12);
    // m2 = 2, m4 = 6.8 -> 6.8 / 4 - 3
    assert_abs_diff_eq!(kurtosis(&x).unwrap(), -1.3, epsilon = 1e-12);
  }

  #[test]
  fn skew_test_flags_lognormal_sample() {
    let x: Vec<f64> = normal_sample(2000, 7).into_iter().map(f64::exp).collect();
    let res = skew_test(&x).unwrap();
    assert!(res.statistic > 0.0);
    assert!(res.p_value < 1e-6, "{res:?}");
  }

  #[test]
  fn normality_tests_accept_normal_sample() {
    let x = normal_sample(4000, 11);
    assert!(skew_test(&x).unwrap().p_value > 0.001);
    assert!(kurtosis_test(&x).unwrap().p_value > 0.001);
    assert!(jarque_bera(&x).unwrap().p_value > 0.001);
  }

  #[test]
  #[traced_test]
  fn kurtosis_test_warns_on_small_samples() {
    let x = [0.1, -0.3, 0.2, 0.5, -0.1, 0.05, -0.4, 0.3];
    let res = kurtosis_test(&x).unwrap();
    assert!(res.p_value.is_finite());
    assert!(logs_contain("only valid for n >= 20"));
  }

  #[test]
  fn skew_test_requires_eight_points() {
    let err = skew_test(&[1.0, 2.0, 3.0]).unwrap_err();
    assert!(matches!(err, QuantError::InsufficientData { needed: 8, got: 3 }));
  }

  #[test]
  fn maximum_drawdown_finds_deepest_trough() {
    let prices = [100.0, 120.0, 90.0, 110.0, 60.0, 130.0];
    assert_abs_diff_eq!(maximum_drawdown(&prices).unwrap(), -0.5, epsilon = 1e-12);
    let dd = drawdown_series(&prices).unwrap();
    assert_abs_diff_eq!(dd[2], -0.25, epsilon = 1e-12);
    assert_eq!(dd[5], 0.0);
  }

  #[test]
  fn stability_of_exponential_growth_is_one() {
    let prices: Vec<f64> = (0..50).map(|t| 100.0 * 1.01_f64.powi(t)).collect();
    assert_abs_diff_eq!(stability_of_timeseries(&prices).unwrap(), 1.0, epsilon = 1e-9);
  }

  #[test]
  fn beta_of_levered_benchmark() {
    let bench = [0.01, -0.02, 0.015, 0.0, -0.005, 0.02];
    let mut prices = vec![100.0];
    for b in bench {
      let last = *prices.last().unwrap();
      prices.push(last * (1.0 + 2.0 * b));
    }
    let ab = alpha_beta(&prices, &bench, 0.0, 252.0).unwrap();
    assert_abs_diff_eq!(ab.beta, 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(ab.alpha, 0.0, epsilon = 1e-9);
  }
}
