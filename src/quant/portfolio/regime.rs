//! # Regime Signal
//!
//! $$
//! \mathbf w_t=\begin{cases}
//! \arg\max \mathrm{SR}(\mathbf w) & s_t=-1\\
//! \arg\max \mu^\top\mathbf w\ \text{s.t.}\ \sigma_p\le\bar\sigma & s_t=0\\
//! \arg\min \sigma_p & s_t=1
//! \end{cases},\qquad
//! V_\tau=\sum_i P_{i,\tau}\,w_{i,t(\tau)}
//! $$
//!
//! Rolling-window backtest driven by a dated regime signal. Each signal date
//! re-estimates a mean-variance model on the trailing `lookback_months` of
//! prices and solves the objective associated with its regime.

use std::fmt;
use std::io::Read;
use std::path::Path;

use chrono::Months;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::efficient_frontier::WeightBounds;
use super::mean_variance::MeanVariance;
use super::mean_variance::MeanVarianceConfig;
use super::types::OptimizationMethod;
use super::types::Weights;
use crate::data::frame::PriceFrame;
use crate::data::frame::business_days;
use crate::data::frame::parse_date;
use crate::error::QuantError;
use crate::error::Result;
use crate::stats::sample::mean;
use crate::stats::summary::PerformanceSummary;
use crate::stats::summary::SummaryConfig;
use crate::stats::summary::summarize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum RegimeSignal {
  RiskOff = -1,
  Neutral = 0,
  RiskOn = 1,
}

impl TryFrom<i8> for RegimeSignal {
  type Error = QuantError;

  fn try_from(v: i8) -> Result<Self> {
    match v {
      -1 => Ok(Self::RiskOff),
      0 => Ok(Self::Neutral),
      1 => Ok(Self::RiskOn),
      other => Err(QuantError::Parse(format!(
        "regime signal must be -1, 0 or 1, got {other}"
      ))),
    }
  }
}

impl From<RegimeSignal> for i8 {
  fn from(s: RegimeSignal) -> i8 {
    s as i8
  }
}

impl fmt::Display for RegimeSignal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", *self as i8)
  }
}

impl RegimeSignal {
  fn method(self, risk_free_rate: f64, ceiling_risk: f64) -> OptimizationMethod {
    match self {
      Self::RiskOff => OptimizationMethod::MaxSharpe { risk_free_rate },
      Self::Neutral => OptimizationMethod::EfficientRisk {
        target_volatility: ceiling_risk,
      },
      Self::RiskOn => OptimizationMethod::MinVolatility,
    }
  }
}

/// Read `date,signal` rows (header required).
pub fn load_signals<P: AsRef<Path>>(path: P) -> Result<Vec<(NaiveDate, RegimeSignal)>> {
  let file = std::fs::File::open(path)?;
  read_signals(file)
}

pub fn read_signals<R: Read>(reader: R) -> Result<Vec<(NaiveDate, RegimeSignal)>> {
  let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
  let mut out = Vec::new();
  for record in rdr.records() {
    let record = record?;
    let (Some(date), Some(signal)) = (record.get(0), record.get(1)) else {
      return Err(QuantError::Parse(format!(
        "expected `date,signal`, got {} fields",
        record.len()
      )));
    };
    let signal: i8 = signal
      .trim()
      .parse()
      .map_err(|e| QuantError::Parse(format!("invalid signal '{signal}': {e}")))?;
    out.push((parse_date(date.trim())?, RegimeSignal::try_from(signal)?));
  }
  Ok(out)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
  pub frequency: f64,
  pub bounds: WeightBounds,
  /// Annual risk-free rate used when no rate series is attached.
  pub risk_free_rate: f64,
  /// Force every asset into the book with bounds `(1/n², 1)`.
  pub full_investment: bool,
  pub lookback_months: u32,
  /// Volatility ceiling of the neutral regime.
  pub ceiling_risk: f64,
}

impl Default for RegimeConfig {
  fn default() -> Self {
    Self {
      frequency: 252.0,
      bounds: WeightBounds::default(),
      risk_free_rate: 0.0,
      full_investment: false,
      lookback_months: 3,
      ceiling_risk: 0.15,
    }
  }
}

impl RegimeConfig {
  pub fn from_json(s: &str) -> Result<Self> {
    serde_json::from_str(s).map_err(|e| QuantError::Parse(format!("regime config: {e}")))
  }
}

#[derive(Debug, Clone)]
pub struct RegimeWeights {
  /// One entry per signal date.
  pub by_date: Vec<(NaiveDate, RegimeSignal, Weights)>,
  /// Mean weights of every regime that occurred.
  pub average: Vec<(RegimeSignal, Weights)>,
}

#[derive(Debug, Clone)]
pub struct RegimePortfolio {
  pub dates: Vec<NaiveDate>,
  pub values: Vec<f64>,
  pub summary: Option<PerformanceSummary>,
}

struct WindowFit {
  weights: Weights,
  fallback: Option<String>,
}

pub struct RegimeSignalModel {
  signals: Vec<(NaiveDate, RegimeSignal)>,
  prices: PriceFrame,
  cfg: RegimeConfig,
  risk_free: Option<Vec<(NaiveDate, f64)>>,
  weights: Option<RegimeWeights>,
}

impl RegimeSignalModel {
  pub fn new(
    signals: Vec<(NaiveDate, RegimeSignal)>,
    prices: PriceFrame,
    cfg: RegimeConfig,
  ) -> Result<Self> {
    if signals.is_empty() || prices.n_assets() == 0 {
      return Err(QuantError::EmptyInput);
    }
    if signals.windows(2).any(|w| w[0].0 >= w[1].0) {
      return Err(QuantError::InvalidParameter(
        "signal dates must be strictly increasing".into(),
      ));
    }
    if cfg.lookback_months == 0 {
      return Err(QuantError::InvalidParameter("lookback_months must be positive".into()));
    }
    Ok(Self {
      signals,
      prices,
      cfg,
      risk_free: None,
      weights: None,
    })
  }

  /// Use the mean of a dated annual rate series over each window instead of
  /// the constant configured rate.
  pub fn with_risk_free_series(mut self, series: Vec<(NaiveDate, f64)>) -> Self {
    self.risk_free = Some(series);
    self.weights = None;
    self
  }

  pub fn signals(&self) -> &[(NaiveDate, RegimeSignal)] {
    &self.signals
  }

  fn window_start(&self, date: NaiveDate) -> Result<NaiveDate> {
    date
      .checked_sub_months(Months::new(self.cfg.lookback_months))
      .ok_or_else(|| QuantError::InvalidParameter(format!("lookback underflows at {date}")))
  }

  fn window_risk_free(&self, start: NaiveDate, end: NaiveDate) -> f64 {
    let Some(series) = &self.risk_free else {
      return self.cfg.risk_free_rate;
    };
    let in_window: Vec<f64> = series
      .iter()
      .filter(|(d, r)| *d >= start && *d <= end && r.is_finite())
      .map(|(_, r)| *r)
      .collect();
    if in_window.is_empty() {
      self.cfg.risk_free_rate
    } else {
      mean(&in_window)
    }
  }

  fn bounds(&self) -> WeightBounds {
    if self.cfg.full_investment {
      let n = self.prices.n_assets() as f64;
      WeightBounds::Uniform(1.0 / (n * n), 1.0)
    } else {
      self.cfg.bounds.clone()
    }
  }

  /// Optimizer and method for the window ending at `date`. The method sees
  /// the rounded rate reported by [`MeanVariance::risk_free_rate`].
  fn window_problem(
    &self,
    date: NaiveDate,
    signal: RegimeSignal,
  ) -> Result<(MeanVariance, OptimizationMethod)> {
    let start = self.window_start(date)?;
    let window = self.prices.slice(start, date);
    let mv = MeanVariance::new(
      window,
      MeanVarianceConfig {
        frequency: self.cfg.frequency,
        bounds: self.bounds(),
        risk_free_rate: Some(self.window_risk_free(start, date)),
      },
    )?;
    let method = signal.method(mv.risk_free_rate(), self.cfg.ceiling_risk);
    Ok((mv, method))
  }

  fn fit_window(&self, date: NaiveDate, signal: RegimeSignal) -> Result<WindowFit> {
    let (mut mv, method) = self.window_problem(date, signal)?;
    debug!(%date, %signal, %method, rf = mv.risk_free_rate(), "solving window");
    match mv.fit(method) {
      Ok(weights) => Ok(WindowFit {
        weights,
        fallback: None,
      }),
      Err(e) if signal == RegimeSignal::Neutral => Ok(WindowFit {
        weights: mv.fit(OptimizationMethod::MinVolatility)?,
        fallback: Some(e.to_string()),
      }),
      Err(e) => Err(e),
    }
  }

  /// Solve every window (in parallel) and average the weights per regime.
  pub fn get_weights(&mut self) -> Result<&RegimeWeights> {
    if self.weights.is_none() {
      let fits: Vec<WindowFit> = self
        .signals
        .par_iter()
        .map(|(date, signal)| self.fit_window(*date, *signal))
        .collect::<Result<_>>()?;

      let mut by_date = Vec::with_capacity(fits.len());
      for ((date, signal), fit) in self.signals.iter().zip(fits) {
        if let Some(reason) = fit.fallback {
          warn!(%date, %reason, "efficient risk failed, falling back to min volatility");
        }
        by_date.push((*date, *signal, fit.weights));
      }

      let average = average_by_regime(self.prices.tickers(), &by_date)?;
      info!(windows = by_date.len(), regimes = average.len(), "regime weights computed");
      self.weights = Some(RegimeWeights { by_date, average });
    }
    self
      .weights
      .as_ref()
      .ok_or_else(|| QuantError::InvalidParameter("weights not computed".into()))
  }

  /// Daily value of the regime portfolio between the first and last signal date.
  ///
  /// Weights and prices are carried forward over a business-day calendar.
  pub fn get_portfolio(&mut self, summary: Option<&SummaryConfig>) -> Result<RegimePortfolio> {
    let (first, last) = match (self.signals.first(), self.signals.last()) {
      (Some(f), Some(l)) => (f.0, l.0),
      _ => return Err(QuantError::EmptyInput),
    };
    let calendar = business_days(first, last);
    let prices = self.prices.forward_fill_to(&calendar);
    let weights = self.get_weights()?;

    let mut values = Vec::with_capacity(calendar.len());
    for (t, day) in calendar.iter().enumerate() {
      let idx = weights.by_date.partition_point(|(d, _, _)| d <= day);
      let Some((_, _, w)) = idx.checked_sub(1).and_then(|i| weights.by_date.get(i)) else {
        continue;
      };
      let value: f64 = prices
        .row(t)
        .iter()
        .zip(w.values())
        .map(|(p, w)| p * w)
        .sum();
      if !value.is_finite() {
        return Err(QuantError::NonFinite);
      }
      values.push(value);
    }
    let dates = calendar[calendar.len() - values.len()..].to_vec();

    let summary = match summary {
      Some(cfg) => Some(summarize(&values, cfg)?),
      None => None,
    };
    Ok(RegimePortfolio {
      dates,
      values,
      summary,
    })
  }
}

fn average_by_regime(
  tickers: &[String],
  by_date: &[(NaiveDate, RegimeSignal, Weights)],
) -> Result<Vec<(RegimeSignal, Weights)>> {
  let mut out = Vec::new();
  for regime in [RegimeSignal::RiskOff, RegimeSignal::Neutral, RegimeSignal::RiskOn] {
    let members: Vec<&Weights> = by_date
      .iter()
      .filter(|(_, s, _)| *s == regime)
      .map(|(_, _, w)| w)
      .collect();
    if members.is_empty() {
      continue;
    }
    let k = members.len() as f64;
    let avg = (0..tickers.len())
      .map(|i| members.iter().map(|w| w.values()[i]).sum::<f64>() / k)
      .collect();
    out.push((regime, Weights::new(tickers.to_vec(), avg)?));
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;
  use crate::data::frame::gbm_frame;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn prices() -> PriceFrame {
    gbm_frame(&[0.1, 0.06, 0.12], &[0.2, 0.1, 0.3], date(2022, 1, 3), 520, 5)
  }

  fn signals() -> Vec<(NaiveDate, RegimeSignal)> {
    vec![
      (date(2022, 6, 1), RegimeSignal::RiskOn),
      (date(2022, 9, 1), RegimeSignal::Neutral),
      (date(2022, 12, 1), RegimeSignal::RiskOn),
      (date(2023, 3, 1), RegimeSignal::Neutral),
    ]
  }

  #[test]
  fn signal_parsing() {
    assert_eq!(RegimeSignal::try_from(-1).unwrap(), RegimeSignal::RiskOff);
    assert!(RegimeSignal::try_from(2).is_err());
    let parsed = read_signals("date,signal\n2022-06-01,1\n2022-07-01,-1\n".as_bytes()).unwrap();
    assert_eq!(parsed[1], (date(2022, 7, 1), RegimeSignal::RiskOff));
  }

  #[test]
  fn config_loads_from_json() {
    let cfg = RegimeConfig::from_json(r#"{"full_investment": true, "lookback_months": 6}"#).unwrap();
    assert!(cfg.full_investment);
    assert_eq!(cfg.lookback_months, 6);
    assert_abs_diff_eq!(cfg.ceiling_risk, 0.15);
  }

  #[test]
  fn rejects_unsorted_signals() {
    let mut s = signals();
    s.swap(0, 1);
    assert!(RegimeSignalModel::new(s, prices(), RegimeConfig::default()).is_err());
  }

  #[test]
  fn weights_per_window_and_regime() {
    let cfg = RegimeConfig {
      ceiling_risk: 0.5,
      ..Default::default()
    };
    let mut model = RegimeSignalModel::new(signals(), prices(), cfg).unwrap();
    let weights = model.get_weights().unwrap();
    assert_eq!(weights.by_date.len(), 4);
    for (_, _, w) in &weights.by_date {
      assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-6);
    }
    let regimes: Vec<RegimeSignal> = weights.average.iter().map(|(r, _)| *r).collect();
    assert_eq!(regimes, vec![RegimeSignal::Neutral, RegimeSignal::RiskOn]);

    let on: Vec<&Weights> = weights
      .by_date
      .iter()
      .filter(|(_, s, _)| *s == RegimeSignal::RiskOn)
      .map(|(_, _, w)| w)
      .collect();
    let expected = (on[0].values()[1] + on[1].values()[1]) / 2.0;
    assert_abs_diff_eq!(weights.average[1].1.values()[1], expected, epsilon = 1e-12);
  }

  #[test]
  fn full_investment_holds_every_asset() {
    let cfg = RegimeConfig {
      full_investment: true,
      ..Default::default()
    };
    let mut model = RegimeSignalModel::new(signals(), prices(), cfg).unwrap();
    for (_, _, w) in &model.get_weights().unwrap().by_date {
      assert!(w.values().iter().all(|v| *v >= 1.0 / 9.0 - 1e-6));
    }
  }

  #[test]
  #[traced_test]
  fn neutral_falls_back_to_min_volatility() {
    let cfg = RegimeConfig {
      ceiling_risk: 0.001,
      ..Default::default()
    };
    let mut model = RegimeSignalModel::new(signals(), prices(), cfg).unwrap();
    assert_eq!(model.get_weights().unwrap().by_date.len(), 4);
    assert!(logs_contain("falling back to min volatility"));
  }

  #[test]
  fn risk_off_uses_rounded_window_rate() {
    let model = RegimeSignalModel::new(signals(), prices(), RegimeConfig::default())
      .unwrap()
      .with_risk_free_series(vec![(date(2022, 4, 1), 0.0149), (date(2022, 5, 2), 0.0149)]);
    let (_, method) = model
      .window_problem(date(2022, 6, 1), RegimeSignal::RiskOff)
      .unwrap();
    assert_eq!(method, OptimizationMethod::MaxSharpe { risk_free_rate: 0.01 });
  }

  #[test]
  fn portfolio_value_follows_calendar() {
    let mut model = RegimeSignalModel::new(signals(), prices(), RegimeConfig::default())
      .unwrap()
      .with_risk_free_series(vec![(date(2022, 5, 2), 0.01), (date(2022, 8, 1), 0.02)]);
    let portfolio = model.get_portfolio(Some(&SummaryConfig::default())).unwrap();
    let calendar = business_days(date(2022, 6, 1), date(2023, 3, 1));
    assert_eq!(portfolio.dates, calendar);
    assert_eq!(portfolio.values.len(), calendar.len());
    assert!(portfolio.values.iter().all(|v| *v > 0.0));
    assert!(portfolio.summary.is_some());
  }
}
