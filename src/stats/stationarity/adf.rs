use std::fmt;

use tracing::debug;

use super::common::CriticalValues;
use super::common::DeterministicTerm;
use super::common::LagSelection;
use super::common::adf_critical_values;
use super::common::choose_lag_for_adf;
use super::common::fit_adf;
use super::common::mackinnon_p_value;
use super::common::max_adf_lag;
use super::common::schwert_max_lags;
use crate::error::QuantError;
use crate::error::Result;
use crate::error::ensure_series;

/// Configuration for the Augmented Dickey-Fuller unit-root test.
#[derive(Debug, Clone, Copy)]
pub struct AdfConfig {
  /// Deterministic terms included in the test regression.
  pub deterministic: DeterministicTerm,
  /// Lag-order selection strategy.
  pub lag_selection: LagSelection,
  /// Maximum lag considered by automatic lag selection.
  pub max_lags: Option<usize>,
  /// Significance level used to compute `reject_unit_root`.
  pub alpha: f64,
}

impl Default for AdfConfig {
  fn default() -> Self {
    Self {
      deterministic: DeterministicTerm::Constant,
      lag_selection: LagSelection::Aic,
      max_lags: None,
      alpha: 0.05,
    }
  }
}

/// Result of the Augmented Dickey-Fuller test.
#[derive(Debug, Clone, Copy)]
pub struct AdfResult {
  /// ADF t-statistic for the lagged level coefficient.
  pub statistic: f64,
  /// MacKinnon approximate p-value.
  pub p_value: f64,
  /// Selected lag order.
  pub used_lags: usize,
  /// Number of regression observations used by the fitted model.
  pub nobs: usize,
  /// Critical values at 1%, 5%, 10% levels.
  pub critical_values: CriticalValues,
  /// Whether the null (unit root) is rejected at `alpha`.
  pub reject_unit_root: bool,
}

impl fmt::Display for AdfResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "ADF Statistic: {:.6}", self.statistic)?;
    writeln!(f, "p-value: {:.6}", self.p_value)?;
    writeln!(f, "Critical Values:")?;
    writeln!(f, "\t1%: {:.3}", self.critical_values.one_percent)?;
    writeln!(f, "\t5%: {:.3}", self.critical_values.five_percent)?;
    write!(f, "\t10%: {:.3}", self.critical_values.ten_percent)
  }
}

/// Augmented Dickey-Fuller unit-root test.
pub fn adf_test(y: &[f64], cfg: AdfConfig) -> Result<AdfResult> {
  ensure_series(y, 20)?;
  if !(cfg.alpha > 0.0 && cfg.alpha < 1.0) {
    return Err(QuantError::InvalidParameter(format!(
      "alpha must be in (0, 1), got {}",
      cfg.alpha
    )));
  }

  let max_possible_lag = max_adf_lag(y.len(), cfg.deterministic).ok_or(
    QuantError::InsufficientData {
      needed: 2 * (cfg.deterministic.n_terms() + 1),
      got: y.len(),
    },
  )?;
  let max_lags = cfg
    .max_lags
    .unwrap_or_else(|| schwert_max_lags(y.len()))
    .min(max_possible_lag);

  let used_lags = match cfg.lag_selection {
    LagSelection::Fixed(p) if p > max_possible_lag => {
      return Err(QuantError::InvalidParameter(format!(
        "fixed lag order {p} too large for {} observations",
        y.len()
      )));
    }
    LagSelection::Fixed(p) => p,
    _ => choose_lag_for_adf(y, cfg.deterministic, cfg.lag_selection, max_lags)?,
  };
  debug!(used_lags, max_lags, "adf lag order");

  let fit = fit_adf(y, used_lags, cfg.deterministic)?;
  let critical_values = adf_critical_values(cfg.deterministic);
  let reject_unit_root = fit.statistic < critical_values.value_at(cfg.alpha);

  Ok(AdfResult {
    statistic: fit.statistic,
    p_value: mackinnon_p_value(fit.statistic, cfg.deterministic),
    used_lags,
    nobs: fit.nobs,
    critical_values,
    reject_unit_root,
  })
}

#[cfg(test)]
mod tests {
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  fn simulate_ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
    let dist = Normal::new(0.0, 1.0).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut x = vec![0.0; n];
    for t in 1..n {
      x[t] = phi * x[t - 1] + dist.sample(&mut rng);
    }
    x
  }

  #[test]
  fn adf_rejects_stationary_ar1() {
    let x = simulate_ar1(0.7, 2400, 7);
    let cfg = AdfConfig {
      lag_selection: LagSelection::Fixed(4),
      ..AdfConfig::default()
    };
    let res = adf_test(&x, cfg).unwrap();
    assert!(
      res.reject_unit_root,
      "expected unit-root rejection, got {res:?}"
    );
    assert!(res.p_value < 0.01);
  }

  #[test]
  fn adf_keeps_unit_root_for_random_walk() {
    let x = simulate_ar1(1.0, 2400, 11);
    let cfg = AdfConfig {
      lag_selection: LagSelection::Fixed(4),
      alpha: 0.01,
      ..AdfConfig::default()
    };
    let res = adf_test(&x, cfg).unwrap();
    assert!(
      !res.reject_unit_root,
      "did not expect unit-root rejection, got {res:?}"
    );
    assert!(res.p_value > 0.01);
  }

  #[test]
  fn automatic_lag_selection_stays_within_bounds() {
    let x = simulate_ar1(0.5, 500, 3);
    for selection in [LagSelection::Aic, LagSelection::Bic, LagSelection::TStat] {
      let res = adf_test(
        &x,
        AdfConfig {
          lag_selection: selection,
          max_lags: Some(8),
          deterministic: DeterministicTerm::ConstantTrend,
          ..AdfConfig::default()
        },
      )
      .unwrap();
      assert!(res.used_lags <= 8);
    }
  }

  #[test]
  fn display_lists_critical_values() {
    let x = simulate_ar1(0.3, 200, 5);
    let text = adf_test(&x, AdfConfig::default()).unwrap().to_string();
    assert!(text.starts_with("ADF Statistic:"));
    assert!(text.contains("p-value:"));
    assert!(text.contains("5%: -2.860"));
  }

  #[test]
  fn shortest_series_works_for_every_deterministic_term() {
    let x = simulate_ar1(0.5, 20, 13);
    for deterministic in [
      DeterministicTerm::None,
      DeterministicTerm::Constant,
      DeterministicTerm::ConstantTrend,
    ] {
      for lag_selection in [LagSelection::Aic, LagSelection::Bic, LagSelection::TStat] {
        let res = adf_test(
          &x,
          AdfConfig {
            deterministic,
            lag_selection,
            ..AdfConfig::default()
          },
        )
        .unwrap();
        assert!(res.used_lags <= max_adf_lag(20, deterministic).unwrap());
        assert!(res.p_value.is_finite());
      }
    }
  }

  #[test]
  fn fixed_lag_above_cap_is_rejected() {
    let x = simulate_ar1(0.5, 20, 13);
    let cfg = AdfConfig {
      deterministic: DeterministicTerm::ConstantTrend,
      lag_selection: LagSelection::Fixed(8),
      ..AdfConfig::default()
    };
    assert!(matches!(adf_test(&x, cfg), Err(QuantError::InvalidParameter(_))));
  }

  #[test]
  fn short_series_is_rejected() {
    let err = adf_test(&[1.0; 10], AdfConfig::default()).unwrap_err();
    assert!(matches!(err, QuantError::InsufficientData { .. }));
  }
}
