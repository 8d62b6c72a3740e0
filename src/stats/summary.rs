//! # Summary
//!
//! One-shot performance report: ratios, annualised moments, distribution
//! shape, drawdown and tail risk for each price series.

use std::fmt;

use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;
use serde::Deserialize;
use serde::Serialize;

use super::annualize::annualised_returns;
use super::annualize::annualised_volatility;
use super::moments::cumulative_returns;
use super::moments::kurtosis;
use super::moments::maximum_drawdown;
use super::moments::skewness;
use super::moments::stability_of_timeseries;
use super::ratios::calmar_ratio;
use super::ratios::omega_ratio;
use super::ratios::sharpe_ratio;
use super::ratios::sortino_ratio;
use super::ratios::tail_ratio;
use super::var::conditional_value_at_risk;
use super::var::value_at_risk;
use crate::data::frame::PriceFrame;
use crate::data::returns::pct_change;
use crate::error::Result;

/// Parameters shared by every metric of the report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
  /// Annual risk-free rate.
  pub risk_free: f64,
  pub periods_per_year: f64,
  /// Per-period minimum acceptable return for Sortino and Omega.
  pub required_return: f64,
  /// Tail probability for VaR and CVaR.
  pub var_cutoff: f64,
}

impl Default for SummaryConfig {
  fn default() -> Self {
    Self {
      risk_free: 0.0,
      periods_per_year: 252.0,
      required_return: 0.0,
      var_cutoff: 0.05,
    }
  }
}

/// Performance metrics of a single price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
  pub sharpe_ratio: f64,
  pub calmar_ratio: f64,
  pub omega_ratio: f64,
  pub sortino_ratio: f64,
  pub tail_ratio: f64,
  pub annualised_returns: f64,
  pub annualised_volatility: f64,
  pub skewness: f64,
  pub kurtosis: f64,
  pub stability: f64,
  pub maximum_drawdown: f64,
  pub cumulative_returns: f64,
  pub value_at_risk: f64,
  pub conditional_value_at_risk: f64,
}

impl PerformanceSummary {
  /// Row labels paired with values, in report order.
  pub fn rows(&self) -> [(&'static str, f64); 14] {
    [
      ("Sharpe ratio", self.sharpe_ratio),
      ("Calmar ratio", self.calmar_ratio),
      ("Omega ratio", self.omega_ratio),
      ("Sortino ratio", self.sortino_ratio),
      ("Tail Ratio", self.tail_ratio),
      ("Annualised Returns", self.annualised_returns),
      ("Annualised Volatility", self.annualised_volatility),
      ("Skewness", self.skewness),
      ("Kurtosis", self.kurtosis),
      ("Stability", self.stability),
      ("Maximum Drawdown", self.maximum_drawdown),
      ("Cumulative Returns", self.cumulative_returns),
      ("Value at Risk", self.value_at_risk),
      ("Conditional Value at Risk", self.conditional_value_at_risk),
    ]
  }
}

/// Compute the full report for one price path.
pub fn summarize(prices: &[f64], cfg: &SummaryConfig) -> Result<PerformanceSummary> {
  let returns = pct_change(prices);
  let ppy = cfg.periods_per_year;

  Ok(PerformanceSummary {
    sharpe_ratio: sharpe_ratio(prices, cfg.risk_free, ppy)?,
    calmar_ratio: calmar_ratio(prices, ppy, cfg.risk_free)?,
    omega_ratio: omega_ratio(prices, cfg.risk_free, ppy, cfg.required_return)?,
    sortino_ratio: sortino_ratio(prices, ppy, cfg.required_return)?,
    tail_ratio: tail_ratio(prices)?,
    annualised_returns: annualised_returns(&returns, ppy),
    annualised_volatility: annualised_volatility(&returns, ppy),
    skewness: skewness(&returns)?,
    kurtosis: kurtosis(&returns)?,
    stability: stability_of_timeseries(prices)?,
    maximum_drawdown: maximum_drawdown(prices)?,
    cumulative_returns: cumulative_returns(prices)?.last().copied().unwrap_or(0.0),
    value_at_risk: value_at_risk(prices, cfg.var_cutoff)?,
    conditional_value_at_risk: conditional_value_at_risk(prices, cfg.var_cutoff)?,
  })
}

/// Reports for every column of a frame.
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
  pub columns: Vec<(String, PerformanceSummary)>,
}

impl SummaryTable {
  pub fn get(&self, ticker: &str) -> Option<&PerformanceSummary> {
    self
      .columns
      .iter()
      .find(|(t, _)| t == ticker)
      .map(|(_, s)| s)
  }

  /// Metrics as rows, tickers as columns.
  pub fn to_table(&self) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new("")];
    header.extend(self.columns.iter().map(|(t, _)| Cell::new(t)));
    table.set_titles(Row::new(header));

    let rows: Vec<_> = self.columns.iter().map(|(_, s)| s.rows()).collect();
    for i in 0..14 {
      let label = rows.first().map(|r| r[i].0).unwrap_or_default();
      let mut cells = vec![Cell::new(label)];
      cells.extend(rows.iter().map(|r| Cell::new(&format!("{:.6}", r[i].1))));
      table.add_row(Row::new(cells));
    }
    table
  }

  pub fn printstd(&self) {
    self.to_table().printstd();
  }
}

impl fmt::Display for SummaryTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_table())
  }
}

pub fn summarize_frame(frame: &PriceFrame, cfg: &SummaryConfig) -> Result<SummaryTable> {
  let columns = frame
    .tickers()
    .iter()
    .zip(frame.columns())
    .map(|(t, p)| Ok((t.clone(), summarize(p, cfg)?)))
    .collect::<Result<Vec<_>>>()?;
  Ok(SummaryTable { columns })
}
