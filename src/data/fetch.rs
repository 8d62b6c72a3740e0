//! # Market Data
//!
//! Daily close prices and the 13-week T-bill yield from Yahoo Finance.

use std::collections::BTreeMap;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use chrono::DateTime;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveTime;
use chrono::Utc;
use time::OffsetDateTime;
use tracing::info;
use yahoo_finance_api as yahoo;

use super::frame::PriceFrame;

/// Ticker of the 13-week US Treasury bill yield index.
pub const TBILL_TICKER: &str = "^IRX";

fn to_offset(date: NaiveDate) -> Result<OffsetDateTime> {
  let ts = date.and_time(NaiveTime::MIN).and_utc().timestamp();
  OffsetDateTime::from_unix_timestamp(ts).context("date out of range")
}

/// Resolve the request window; either bound missing means the trailing 365 days.
fn window(start: Option<NaiveDate>, end: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
  match (start, end) {
    (Some(s), Some(e)) => (s, e),
    _ => {
      let today = Utc::now().date_naive();
      (today - Duration::days(365), today)
    }
  }
}

async fn closes(
  provider: &yahoo::YahooConnector,
  ticker: &str,
  start: NaiveDate,
  end: NaiveDate,
) -> Result<Vec<(NaiveDate, f64)>> {
  let response = provider
    .get_quote_history(ticker, to_offset(start)?, to_offset(end)?)
    .await
    .with_context(|| format!("quote history request failed for {ticker}"))?;
  let quotes = response
    .quotes()
    .with_context(|| format!("no quotes returned for {ticker}"))?;

  let mut out: Vec<(NaiveDate, f64)> = quotes
    .iter()
    .filter_map(|q| {
      DateTime::from_timestamp(q.timestamp as i64, 0).map(|dt| (dt.date_naive(), q.close))
    })
    .collect();
  out.sort_by_key(|(d, _)| *d);
  out.dedup_by_key(|(d, _)| *d);
  Ok(out)
}

/// Daily closes for `tickers`, pivoted onto the union of trading dates.
///
/// Rows before every ticker has traded are dropped; later gaps are forward filled.
pub async fn fetch_prices(
  tickers: &[&str],
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
) -> Result<PriceFrame> {
  if tickers.is_empty() {
    bail!("at least one ticker is required");
  }
  let (start, end) = window(start, end);
  let provider = yahoo::YahooConnector::new().context("failed to build yahoo connector")?;

  let mut table: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
  for (j, ticker) in tickers.iter().enumerate() {
    for (date, close) in closes(&provider, ticker, start, end).await? {
      table.entry(date).or_insert_with(|| vec![None; tickers.len()])[j] = Some(close);
    }
  }

  let mut dates = Vec::with_capacity(table.len());
  let mut columns = vec![Vec::with_capacity(table.len()); tickers.len()];
  let mut last: Vec<Option<f64>> = vec![None; tickers.len()];
  for (date, row) in table {
    for (j, v) in row.into_iter().enumerate() {
      if v.is_some() {
        last[j] = v;
      }
    }
    if last.iter().all(Option::is_some) {
      dates.push(date);
      for (j, v) in last.iter().enumerate() {
        columns[j].push(v.unwrap_or(f64::NAN));
      }
    }
  }

  if dates.is_empty() {
    bail!("no overlapping history for {tickers:?} between {start} and {end}");
  }
  info!(tickers = ?tickers, %start, %end, rows = dates.len(), "loaded price history");

  let names = tickers.iter().map(|t| t.to_string()).collect();
  Ok(PriceFrame::new(dates, names, columns)?)
}

/// Annualised risk-free rate (decimal) from the 13-week T-bill yield.
pub async fn risk_free_rate(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<PriceFrame> {
  let (start, end) = window(start, end);
  let provider = yahoo::YahooConnector::new().context("failed to build yahoo connector")?;
  let series = closes(&provider, TBILL_TICKER, start, end).await?;
  if series.is_empty() {
    bail!("no T-bill yields between {start} and {end}");
  }

  let (dates, yields): (Vec<_>, Vec<_>) = series.into_iter().map(|(d, y)| (d, y / 100.0)).unzip();
  Ok(PriceFrame::from_series(TBILL_TICKER, dates, yields)?)
}

/// Blocking wrapper around [`fetch_prices`] for synchronous callers.
pub fn fetch_prices_blocking(
  tickers: &[&str],
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
) -> Result<PriceFrame> {
  let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
  rt.block_on(fetch_prices(tickers, start, end))
}

/// Mean risk-free rate over the window, blocking.
pub fn mean_risk_free_rate_blocking(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<f64> {
  let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
  let frame = rt.block_on(risk_free_rate(start, end))?;
  let col = &frame.columns()[0];
  Ok(col.iter().sum::<f64>() / col.len() as f64)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_bound_falls_back_to_trailing_year() {
    let s = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let (start, end) = window(Some(s), None);
    assert_eq!((end - start).num_days(), 365);
  }

  #[test]
  fn explicit_window_is_kept() {
    let s = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let e = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
    assert_eq!(window(Some(s), Some(e)), (s, e));
  }
}
